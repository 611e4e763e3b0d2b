//! bridge-tools: Tool System
//!
//! - [`registry`]: name → descriptor mapping used for discovery and dispatch
//! - [`schema`] / [`validator`]: typed input contracts and their checks
//! - [`dispatcher`]: resolves, validates and runs an invocation against a backend
//! - [`builtin`]: the tools every bridge exposes

pub mod builtin;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod schema;
pub mod validator;

pub use builtin::register_builtin_tools;
pub use dispatcher::{DispatchOutcome, Dispatcher, FailureKind};
pub use error::{Result, ToolError};
pub use registry::{Capability, ToolDefinition, ToolDescriptor, ToolRegistry};
pub use schema::{Field, ObjectSchema, Schema};
pub use validator::{SchemaValidator, ValidationError};
