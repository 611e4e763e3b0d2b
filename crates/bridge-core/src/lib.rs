//! bridge-core: shared building blocks for the MCP tool bridge
//!
//! Everything here is consumed by more than one crate:
//! - [`backend`]: the Backend Adapter contract (vector query/upsert, document fetch)
//! - [`error`]: error kinds raised by adapters and configuration
//! - [`config`]: layered settings (defaults → TOML → environment)

pub mod backend;
pub mod config;
pub mod error;

pub use backend::{
    Backend, DocumentRecord, QueryMatch, QueryResponse, UpsertResponse, VectorQuery,
    VectorRecord, VectorUpsert,
};
pub use config::{load_environment, DeliveryMode, Settings};
pub use error::{AdapterError, ConfigError};
