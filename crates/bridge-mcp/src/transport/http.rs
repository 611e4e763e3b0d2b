//! HTTP+SSE Transport
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /sse` | streaming connection (server push) |
//! | `POST /invoke`, `POST /message` | invocation channel, acknowledged immediately |
//! | `GET /tools` | capability discovery |
//! | `POST /mcp` | synchronous JSON-RPC |
//! | `GET /health` | liveness and open connection count |

use crate::bridge::{Accepted, Bridge, InvocationRejected};
use crate::outcome::InvocationBody;
use crate::protocol::McpRequest;
use crate::server::McpServer;
use crate::session::ConnectionId;
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use anyhow::{Context, Result};
use bridge_core::DeliveryMode;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Shared state for HTTP handlers
pub struct HttpState {
    pub bridge: Arc<Bridge>,
    pub mcp: McpServer,
    pub keepalive: Duration,
    /// Per-connection event buffer
    pub channel_capacity: usize,
}

impl HttpState {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        let mcp = McpServer::new(bridge.dispatcher().clone());
        Self {
            bridge,
            mcp,
            keepalive: Duration::from_secs(15),
            channel_capacity: 64,
        }
    }

    pub fn with_keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

/// Build the axum router for the bridge
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/tools", get(tools_handler))
        .route("/sse", get(sse_handler))
        .route("/invoke", post(invoke_handler))
        .route("/message", post(invoke_handler))
        .route("/mcp", post(mcp_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// HTTP+SSE server bound to one address
pub struct HttpSseTransport {
    bind_addr: String,
}

impl HttpSseTransport {
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
        }
    }

    /// Serve until `shutdown` resolves, then close every streaming connection
    pub async fn serve<F>(self, state: Arc<HttpState>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sessions = state.bridge.sessions().clone();
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.bind_addr))?;
        info!(addr = %self.bind_addr, "HTTP+SSE transport listening");

        // Open SSE streams never finish on their own, so they are ended before
        // axum waits for in-flight requests.
        let shutdown_sessions = sessions.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("Shutdown requested");
                shutdown_sessions.shutdown();
            })
            .await
            .context("HTTP server error")?;

        sessions.shutdown();
        Ok(())
    }
}

/// Closes its connection when the SSE stream is dropped (client went away)
struct ConnectionGuard {
    bridge: Arc<Bridge>,
    id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.bridge.on_connection_close(self.id);
    }
}

// === Errors ===

impl InvocationRejected {
    pub fn status_code(&self) -> StatusCode {
        match self {
            InvocationRejected::Malformed(_) => StatusCode::BAD_REQUEST,
            InvocationRejected::NoActiveChannel(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for InvocationRejected {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// === Handlers ===

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "protocol": PROTOCOL_VERSION,
        "endpoints": {
            "sse": "GET /sse",
            "invoke": "POST /invoke",
            "tools": "GET /tools",
            "mcp": "POST /mcp",
            "health": "GET /health"
        }
    }))
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "connections": state.bridge.sessions().count(),
        "open_connections": state.bridge.sessions().connections(),
        "delivery": state.bridge.delivery().to_string()
    }))
}

async fn tools_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    Json(json!({ "tools": state.bridge.on_list_tools() }))
}

async fn sse_handler(
    State(state): State<Arc<HttpState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<String>(state.channel_capacity);
    let id = state.bridge.on_connection_open(tx);
    let guard = ConnectionGuard {
        bridge: state.bridge.clone(),
        id,
    };

    let stream = ReceiverStream::new(rx).map(move |data| {
        let _guard = &guard;
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keepalive)
            .text("keepalive"),
    )
}

#[derive(Debug, Default, Deserialize)]
struct InvokeParams {
    #[serde(default)]
    connection: Option<String>,
}

async fn invoke_handler(
    State(state): State<Arc<HttpState>>,
    Query(params): Query<InvokeParams>,
    body: Result<Json<InvocationBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Accepted>), InvocationRejected> {
    let Json(body) = body.map_err(|e| InvocationRejected::Malformed(e.body_text()))?;

    // The connection parameter only routes results in origin mode.
    let origin = match (state.bridge.delivery(), params.connection.as_deref()) {
        (DeliveryMode::Origin, Some(c)) => Some(c.parse::<ConnectionId>().map_err(|_| {
            InvocationRejected::Malformed(format!("invalid connection id '{}'", c))
        })?),
        _ => None,
    };

    let request = state.bridge.parse_invocation(body, origin)?;
    debug!(id = %request.correlation_id, tool = %request.tool_name, "Invocation received");

    let accepted = state.bridge.on_invocation(request)?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

async fn mcp_handler(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    let request = match McpRequest::parse(&body) {
        Ok(request) => request,
        Err(response) => {
            debug!("Rejected undecodable MCP request");
            return Json(response).into_response();
        }
    };
    debug!(method = %request.method, "HTTP MCP request");

    let notification = request.is_notification();
    let response = state.mcp.handle_request(request).await;
    if notification {
        StatusCode::ACCEPTED.into_response()
    } else {
        Json(response).into_response()
    }
}
