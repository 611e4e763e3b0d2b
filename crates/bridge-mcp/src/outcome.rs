//! Invocation and streaming-event wire types
//!
//! Streaming events (one JSON document per SSE `data:` line):
//!
//! ```text
//! {"type":"server_ready","connection":"<id>"}
//! {"id":"req-1","name":"notion_get_page","status":"success","result":{...}}
//! {"id":"req-2","name":"foo_bar","status":"error","error":"unknown tool: foo_bar"}
//! ```

use crate::session::ConnectionId;
use bridge_tools::DispatchOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of a POST to the invocation channel, before checking
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvocationBody {
    /// Correlation id; strings and numbers are accepted
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// An accepted invocation, owned by the flow handling it
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub correlation_id: String,
    pub tool_name: String,
    pub arguments: Value,
    /// Connection that issued the request, when known
    pub origin: Option<ConnectionId>,
}

impl InvocationRequest {
    pub fn new(correlation_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            tool_name: tool_name.into(),
            arguments,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: ConnectionId) -> Self {
        self.origin = Some(origin);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Result of one invocation, tagged with its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    pub id: String,
    pub name: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationOutcome {
    pub fn from_dispatch(id: impl Into<String>, name: impl Into<String>, outcome: DispatchOutcome) -> Self {
        let (status, result, error) = match outcome {
            DispatchOutcome::Success(value) => (Status::Success, Some(value), None),
            DispatchOutcome::Error { message, .. } => (Status::Error, None, Some(message)),
        };
        Self {
            id: id.into(),
            name: name.into(),
            status,
            result,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// MCP `tools/call` result: a text content block carrying the JSON result
    pub fn to_content(&self) -> Value {
        let text = match (&self.result, &self.error) {
            (Some(result), _) => {
                serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string())
            }
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        json!({
            "content": [{ "type": "text", "text": text }],
            "isError": !self.is_success()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub connection: ConnectionId,
}

/// Anything pushed down a streaming connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Ready(ReadyEvent),
    Outcome(InvocationOutcome),
}

impl StreamEvent {
    pub fn ready(connection: ConnectionId) -> Self {
        StreamEvent::Ready(ReadyEvent {
            kind: "server_ready",
            connection,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<InvocationOutcome> for StreamEvent {
    fn from(outcome: InvocationOutcome) -> Self {
        StreamEvent::Outcome(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_tools::FailureKind;

    #[test]
    fn test_success_event_shape() {
        let outcome = InvocationOutcome::from_dispatch(
            "req-1",
            "notion_get_page",
            DispatchOutcome::Success(json!({"title": "Doc"})),
        );
        let value: Value =
            serde_json::from_str(&StreamEvent::from(outcome).to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"id": "req-1", "name": "notion_get_page", "status": "success", "result": {"title": "Doc"}})
        );
    }

    #[test]
    fn test_error_event_shape() {
        let outcome = InvocationOutcome::from_dispatch(
            "req-2",
            "foo_bar",
            DispatchOutcome::failure(FailureKind::UnknownTool, "unknown tool: foo_bar"),
        );
        let value = serde_json::to_value(StreamEvent::from(outcome)).unwrap();
        assert_eq!(
            value,
            json!({"id": "req-2", "name": "foo_bar", "status": "error", "error": "unknown tool: foo_bar"})
        );
    }

    #[test]
    fn test_ready_event_shape() {
        let id = ConnectionId::new();
        let value = serde_json::to_value(StreamEvent::ready(id)).unwrap();
        assert_eq!(value["type"], "server_ready");
        assert_eq!(value["connection"], id.to_string());
    }

    #[test]
    fn test_content_block() {
        let outcome = InvocationOutcome::from_dispatch(
            "1",
            "pinecone_upsert",
            DispatchOutcome::Success(json!({"count": 2})),
        );
        let content = outcome.to_content();
        assert_eq!(content["isError"], false);
        assert!(content["content"][0]["text"].as_str().unwrap().contains("\"count\": 2"));
    }
}
