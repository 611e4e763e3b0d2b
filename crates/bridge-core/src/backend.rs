//! Backend Adapter contract
//!
//! One async operation per capability. The dispatcher deserializes validated
//! tool arguments into the request records below, so the serde field names
//! here are the wire names clients send (`topK`, `indexName`, ...).

use crate::error::AdapterError;
use async_trait::async_trait;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Document record returned by the document service, passed through untouched
pub type DocumentRecord = Value;

/// Nearest-neighbour query against a vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    #[serde(deserialize_with = "integral_u32")]
    pub top_k: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_metadata: Option<bool>,
}

/// Accepts `3` and `3.0`, rejects fractions, negatives and overflow
fn integral_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    let value = match number.as_u64() {
        Some(n) => Some(n),
        None => number
            .as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64),
    };
    value
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| de::Error::custom(format!("expected a non-negative integer, got {}", number)))
}

/// A single vector to write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Batch upsert into a vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorUpsert {
    pub vectors: Vec<VectorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub count: u64,
}

/// External collaborator performing the actual domain operations.
///
/// Implementations must be safe to call concurrently; the dispatcher runs
/// one call per in-flight invocation.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn vector_query(&self, request: VectorQuery) -> Result<QueryResponse, AdapterError>;

    async fn vector_upsert(&self, request: VectorUpsert) -> Result<UpsertResponse, AdapterError>;

    async fn fetch_document(&self, document_id: &str) -> Result<DocumentRecord, AdapterError>;
}
