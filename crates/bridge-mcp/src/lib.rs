//! bridge-mcp: MCP Tool Bridge
//!
//! Bridges a tool-calling client to backend capabilities over a long-lived
//! server-push channel.
//!
//! Architecture:
//! ```text
//! GET /sse ──────► SessionManager.open ──► server_ready
//! POST /invoke ──► Bridge.on_invocation ─► {ok: true}          (now)
//!                        └─► Dispatcher.dispatch ─► broadcast  (later)
//! ```
//!
//! Modules:
//! - [`session`]: Streaming Session Manager
//! - [`bridge`]: Protocol Front Door
//! - [`outcome`]: invocation and stream event wire types
//! - [`server`] / [`protocol`]: synchronous JSON-RPC (`/mcp`)
//! - [`transport`]: axum HTTP+SSE routes

pub mod bridge;
pub mod outcome;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use bridge::{Accepted, Bridge, InvocationRejected};
pub use outcome::{InvocationBody, InvocationOutcome, InvocationRequest, Status, StreamEvent};
pub use protocol::{JsonRpcError, McpRequest, McpResponse};
pub use server::McpServer;
pub use session::{ConnectionId, EventSink, SessionManager, SinkError};

pub const SERVER_NAME: &str = "mcp-bridge";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PROTOCOL_VERSION: &str = "2024-11-05";

