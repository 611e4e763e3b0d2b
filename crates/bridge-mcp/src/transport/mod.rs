//! Transport Layer
//!
//! HTTP+SSE is the only transport: streaming connections over `GET /sse`,
//! invocations over `POST /invoke`.

mod http;

pub use http::{router, HttpSseTransport, HttpState};
