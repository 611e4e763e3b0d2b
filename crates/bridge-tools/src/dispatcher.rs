//! Invocation Dispatcher
//!
//! Turns `(tool name, arguments)` into exactly one [`DispatchOutcome`]:
//! resolve → validate → decode → call backend (bounded by a timeout).
//! Every failure along the way, including a panicking backend, becomes an
//! error outcome; `dispatch` itself has no error path.

use crate::registry::{Capability, ToolRegistry};
use crate::error::ToolError;
use crate::validator::ValidationError;
use bridge_core::{AdapterError, Backend, VectorQuery, VectorUpsert};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Where a failed dispatch went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTool,
    Validation,
    Adapter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success(Value),
    Error { kind: FailureKind, message: String },
}

impl DispatchOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        DispatchOutcome::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }
}

/// Arguments of the document fetch capability
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchArgs {
    #[serde(alias = "documentId")]
    page_id: String,
}

enum CallError {
    Decode(ValidationError),
    Adapter(AdapterError),
}

impl From<AdapterError> for CallError {
    fn from(err: AdapterError) -> Self {
        CallError::Adapter(err)
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    backend: Arc<dyn Backend>,
    timeout: Duration,
}

impl Dispatcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(registry: Arc<ToolRegistry>, backend: Arc<dyn Backend>) -> Self {
        Self {
            registry,
            backend,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Bound every backend call; a call that exceeds it becomes an error outcome
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, tool_name: &str, arguments: Value) -> DispatchOutcome {
        let descriptor = match self.registry.resolve(tool_name) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(tool = %tool_name, "Rejected invocation of unknown tool");
                return DispatchOutcome::failure(FailureKind::UnknownTool, e.to_string());
            }
        };

        let arguments = if arguments.is_null() {
            Value::Object(Map::new())
        } else {
            arguments
        };

        if let Err(e) = self.registry.validate(tool_name, &arguments) {
            debug!(tool = %tool_name, error = %e, "Arguments failed validation");
            let kind = match e {
                ToolError::UnknownTool(_) => FailureKind::UnknownTool,
                _ => FailureKind::Validation,
            };
            return DispatchOutcome::failure(kind, e.to_string());
        }

        debug!(tool = %tool_name, capability = ?descriptor.capability, "Dispatching");
        let started = Instant::now();

        let call = AssertUnwindSafe(self.invoke(descriptor.capability, arguments)).catch_unwind();
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(Ok(value))) => DispatchOutcome::Success(value),
            Ok(Ok(Err(CallError::Decode(e)))) => {
                DispatchOutcome::failure(FailureKind::Validation, e.message)
            }
            Ok(Ok(Err(CallError::Adapter(e)))) => {
                warn!(tool = %tool_name, error = %e, transient = e.is_transient(), "Backend call failed");
                DispatchOutcome::failure(FailureKind::Adapter, e.to_string())
            }
            Ok(Err(_panic)) => {
                warn!(tool = %tool_name, "Backend call panicked");
                DispatchOutcome::failure(
                    FailureKind::Adapter,
                    format!("backend panicked while handling {}", tool_name),
                )
            }
            Err(_elapsed) => {
                let e = AdapterError::Timeout(self.timeout);
                warn!(tool = %tool_name, error = %e, "Backend call timed out");
                DispatchOutcome::failure(FailureKind::Adapter, e.to_string())
            }
        };

        debug!(
            tool = %tool_name,
            success = outcome.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Dispatch complete"
        );
        outcome
    }

    async fn invoke(&self, capability: Capability, arguments: Value) -> Result<Value, CallError> {
        match capability {
            Capability::VectorQuery => {
                let request: VectorQuery = decode(arguments)?;
                encode(self.backend.vector_query(request).await?)
            }
            Capability::VectorUpsert => {
                let request: VectorUpsert = decode(arguments)?;
                encode(self.backend.vector_upsert(request).await?)
            }
            Capability::FetchDocument => {
                let args: FetchArgs = decode(arguments)?;
                Ok(self.backend.fetch_document(&args.page_id).await?)
            }
        }
    }
}

fn decode<T: DeserializeOwned>(arguments: Value) -> Result<T, CallError> {
    serde_json::from_value(arguments)
        .map_err(|e| CallError::Decode(ValidationError::undecodable(e.to_string())))
}

fn encode<T: Serialize>(result: T) -> Result<Value, CallError> {
    serde_json::to_value(result)
        .map_err(|e| CallError::Adapter(AdapterError::invalid_response("backend", e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::register_builtin_tools;
    use async_trait::async_trait;
    use bridge_core::{DocumentRecord, QueryMatch, QueryResponse, UpsertResponse};
    use serde_json::json;

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Succeed,
        Fail,
        Hang,
        Panic,
    }

    struct MockBackend {
        mode: Mode,
    }

    impl MockBackend {
        fn check(&self) -> Result<(), AdapterError> {
            match self.mode {
                Mode::Fail => Err(AdapterError::not_configured("mock", "no credentials")),
                Mode::Panic => panic!("mock backend exploded"),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn vector_query(&self, request: VectorQuery) -> Result<QueryResponse, AdapterError> {
            if self.mode == Mode::Hang {
                std::future::pending::<()>().await;
            }
            self.check()?;
            Ok(QueryResponse {
                matches: (0..request.top_k)
                    .map(|i| QueryMatch {
                        id: format!("doc-{}", i),
                        score: 1.0 - i as f32 * 0.25,
                        values: vec![],
                        metadata: None,
                    })
                    .collect(),
            })
        }

        async fn vector_upsert(&self, request: VectorUpsert) -> Result<UpsertResponse, AdapterError> {
            self.check()?;
            Ok(UpsertResponse {
                count: request.vectors.len() as u64,
            })
        }

        async fn fetch_document(&self, document_id: &str) -> Result<DocumentRecord, AdapterError> {
            self.check()?;
            Ok(json!({"id": document_id, "title": "Doc"}))
        }
    }

    fn dispatcher(mode: Mode) -> Dispatcher {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        Dispatcher::new(Arc::new(registry), Arc::new(MockBackend { mode }))
            .with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_success_wraps_backend_result() {
        let outcome = dispatcher(Mode::Succeed)
            .dispatch("notion_get_page", json!({"pageId": "abc123"}))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::Success(json!({"id": "abc123", "title": "Doc"}))
        );

        let outcome = dispatcher(Mode::Succeed)
            .dispatch("pinecone_query", json!({"vector": [0.1, 0.2], "topK": 2}))
            .await;
        let DispatchOutcome::Success(value) = outcome else {
            panic!("expected success");
        };
        assert_eq!(value["matches"].as_array().unwrap().len(), 2);
        assert_eq!(value["matches"][0]["id"], "doc-0");
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let outcome = dispatcher(Mode::Succeed).dispatch("foo_bar", json!({})).await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(FailureKind::UnknownTool, "unknown tool: foo_bar")
        );
    }

    #[tokio::test]
    async fn test_missing_argument() {
        let outcome = dispatcher(Mode::Succeed)
            .dispatch("notion_get_page", json!({}))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(FailureKind::Validation, "pageId is required")
        );
    }

    #[tokio::test]
    async fn test_null_arguments_treated_as_empty() {
        let outcome = dispatcher(Mode::Succeed)
            .dispatch("notion_get_page", Value::Null)
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(FailureKind::Validation, "pageId is required")
        );
    }

    #[tokio::test]
    async fn test_integral_float_top_k_accepted() {
        let outcome = dispatcher(Mode::Succeed)
            .dispatch("pinecone_query", json!({"vector": [0.1], "topK": 3.0}))
            .await;
        let DispatchOutcome::Success(value) = outcome else {
            panic!("expected success");
        };
        assert_eq!(value["matches"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_undecodable_arguments() {
        let outcome = dispatcher(Mode::Succeed)
            .dispatch("pinecone_query", json!({"vector": [0.1], "topK": -1}))
            .await;
        match outcome {
            DispatchOutcome::Error { kind, message } => {
                assert_eq!(kind, FailureKind::Validation);
                assert!(message.starts_with("arguments:"), "{}", message);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_adapter_failure_becomes_outcome() {
        let outcome = dispatcher(Mode::Fail)
            .dispatch("pinecone_upsert", json!({"vectors": [{"id": "a", "values": [0.5]}]}))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(
                FailureKind::Adapter,
                "mock is not configured: no credentials"
            )
        );
    }

    #[tokio::test]
    async fn test_panicking_backend_becomes_outcome() {
        let outcome = dispatcher(Mode::Panic)
            .dispatch("notion_get_page", json!({"pageId": "x"}))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(
                FailureKind::Adapter,
                "backend panicked while handling notion_get_page"
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let outcome = dispatcher(Mode::Hang)
            .dispatch("pinecone_query", json!({"vector": [0.1], "topK": 1}))
            .await;
        assert_eq!(
            outcome,
            DispatchOutcome::failure(FailureKind::Adapter, "backend call timed out after 5s")
        );
    }

    #[tokio::test]
    async fn test_every_combination_yields_one_outcome() {
        let cases = [
            ("notion_get_page", json!({"pageId": "p"})),
            ("notion_get_page", json!({"pageId": 7})),
            ("missing_tool", json!({"pageId": "p"})),
            ("missing_tool", json!("garbage")),
        ];
        for mode in [Mode::Succeed, Mode::Fail] {
            let dispatcher = dispatcher(mode);
            for (tool, args) in cases.iter() {
                let outcome = dispatcher.dispatch(tool, args.clone()).await;
                let expect_success =
                    mode == Mode::Succeed && *tool == "notion_get_page" && args["pageId"].is_string();
                assert_eq!(outcome.is_success(), expect_success, "{} {}", tool, args);
            }
        }
    }
}
