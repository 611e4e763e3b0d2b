//! Synchronous MCP Server
//!
//! JSON-RPC handling for clients that want the result in the response body
//! instead of over the streaming channel. Shares the registry and dispatcher
//! with the [`Bridge`](crate::Bridge).

use crate::outcome::InvocationOutcome;
use crate::protocol::{JsonRpcError, McpRequest, McpResponse};
use crate::{PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION};
use bridge_tools::{DispatchOutcome, Dispatcher, FailureKind};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Tool information in MCP listing form
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn handle_request(&self, request: McpRequest) -> McpResponse {
        debug!(method = %request.method, "Handling MCP request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "initialized" | "notifications/initialized" | "ping" => {
                McpResponse::success(request.id, json!({}))
            }
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            _ => McpResponse::error(request.id, JsonRpcError::method_not_found(&request.method)),
        }
    }

    fn handle_initialize(&self, request: McpRequest) -> McpResponse {
        let client = request
            .params
            .as_ref()
            .and_then(|p| p.pointer("/clientInfo/name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = %client, "MCP client initialized");

        McpResponse::success(
            request.id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false }
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    fn handle_tools_list(&self, request: McpRequest) -> McpResponse {
        let tools: Vec<ToolInfo> = self
            .dispatcher
            .registry()
            .definitions()
            .into_iter()
            .map(|d| ToolInfo {
                name: d.name,
                description: d.description,
                input_schema: d.input_schema,
            })
            .collect();

        McpResponse::success(request.id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, request: McpRequest) -> McpResponse {
        let Some(params) = request.params.as_ref() else {
            return McpResponse::error(request.id, JsonRpcError::invalid_params("Missing params"));
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return McpResponse::error(
                request.id,
                JsonRpcError::invalid_params("Missing tool name"),
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let result = self.dispatcher.dispatch(name, arguments).await;
        if let DispatchOutcome::Error {
            kind: FailureKind::UnknownTool,
            message,
        } = &result
        {
            return McpResponse::error(request.id, JsonRpcError::invalid_params(message.clone()));
        }

        let correlation = request
            .id
            .as_ref()
            .map(|id| match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        let outcome = InvocationOutcome::from_dispatch(correlation, name, result);
        McpResponse::success(request.id, outcome.to_content())
    }
}
