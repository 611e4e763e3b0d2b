//! Pinecone Vector Index Client
//!
//! ## API Endpoints
//!
//! | Endpoint | URL | Purpose |
//! |----------|-----|--------|
//! | Control plane | `https://api.pinecone.io/indexes/{name}` | Resolve an index's data-plane host |
//! | Query | `https://{host}/query` | Nearest-neighbour search |
//! | Upsert | `https://{host}/vectors/upsert` | Write vectors |
//!
//! ## Authentication
//! - Header: `Api-Key: {PINECONE_API_KEY}`
//! - Header: `X-Pinecone-API-Version: 2024-07`

use crate::http::{client, send_json};
use bridge_core::config::PineconeSettings;
use bridge_core::{AdapterError, QueryMatch, QueryResponse, UpsertResponse, VectorQuery, VectorUpsert};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

pub const SERVICE: &str = "pinecone";

pub mod endpoints {
    pub const CONTROL_URL: &str = "https://api.pinecone.io";
    pub const INDEXES: &str = "/indexes";
    pub const QUERY: &str = "/query";
    pub const UPSERT: &str = "/vectors/upsert";
    pub const API_VERSION: &str = "2024-07";
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

#[derive(Debug, Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PineconeUpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

pub struct PineconeClient {
    client: Client,
    api_key: Option<String>,
    control_url: String,
    api_version: String,
    default_index: Option<String>,
    /// Data-plane host for the default index, when known up front
    default_host: Option<String>,
    default_namespace: Option<String>,
    /// index name → data-plane base URL
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, AdapterError> {
        Ok(Self {
            client: client(SERVICE, timeout)?,
            api_key,
            control_url: endpoints::CONTROL_URL.to_string(),
            api_version: endpoints::API_VERSION.to_string(),
            default_index: None,
            default_host: None,
            default_namespace: None,
            hosts: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_settings(settings: &PineconeSettings, timeout: Duration) -> Result<Self, AdapterError> {
        let mut client = Self::new(settings.api_key.clone(), timeout)?
            .with_control_url(&settings.control_url);
        client.api_version = settings.api_version.clone();
        client.default_index = settings.default_index.clone();
        client.default_host = settings.index_host.as_deref().map(base_url);
        client.default_namespace = settings.namespace.clone();
        Ok(client)
    }

    pub fn with_control_url(mut self, url: impl AsRef<str>) -> Self {
        self.control_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_index(mut self, name: impl Into<String>) -> Self {
        self.default_index = Some(name.into());
        self
    }

    pub fn with_index_host(mut self, host: impl AsRef<str>) -> Self {
        self.default_host = Some(base_url(host.as_ref()));
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub async fn query(&self, request: &VectorQuery) -> Result<QueryResponse, AdapterError> {
        let api_key = self.api_key()?;
        if request.vector.is_empty() {
            return Err(AdapterError::InvalidInput("vector must not be empty".into()));
        }
        if request.top_k == 0 {
            return Err(AdapterError::InvalidInput("topK must be at least 1".into()));
        }

        let host = self.resolve_host(api_key, request.index_name.as_deref()).await?;
        let url = format!("{}{}", host, endpoints::QUERY);
        debug!(url = %url, top_k = request.top_k, "Pinecone query");

        let body = query_body(request, self.default_namespace.as_deref());
        let response: PineconeQueryResponse =
            send_json(SERVICE, self.authorized(self.client.post(&url), api_key).json(&body)).await?;

        Ok(QueryResponse {
            matches: response.matches,
        })
    }

    pub async fn upsert(&self, request: &VectorUpsert) -> Result<UpsertResponse, AdapterError> {
        let api_key = self.api_key()?;
        if request.vectors.is_empty() {
            return Err(AdapterError::InvalidInput("vectors must not be empty".into()));
        }

        let host = self.resolve_host(api_key, request.index_name.as_deref()).await?;
        let url = format!("{}{}", host, endpoints::UPSERT);
        debug!(url = %url, count = request.vectors.len(), "Pinecone upsert");

        let body = upsert_body(request, self.default_namespace.as_deref());
        let response: PineconeUpsertResponse =
            send_json(SERVICE, self.authorized(self.client.post(&url), api_key).json(&body)).await?;

        Ok(UpsertResponse {
            count: response.upserted_count,
        })
    }

    fn api_key(&self) -> Result<&str, AdapterError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AdapterError::not_configured(SERVICE, "PINECONE_API_KEY is not set"))
    }

    fn authorized(&self, request: RequestBuilder, api_key: &str) -> RequestBuilder {
        request
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
            .header("Content-Type", "application/json")
    }

    /// Find the data-plane URL for an index, asking the control plane once per name
    async fn resolve_host(&self, api_key: &str, index: Option<&str>) -> Result<String, AdapterError> {
        let is_default = index.is_none() || index == self.default_index.as_deref();
        if is_default {
            if let Some(host) = &self.default_host {
                return Ok(host.clone());
            }
        }

        let name = index
            .or(self.default_index.as_deref())
            .ok_or_else(|| {
                AdapterError::not_configured(
                    SERVICE,
                    "no indexName given and PINECONE_INDEX_NAME is not set",
                )
            })?;

        if let Some(host) = self.hosts.read().await.get(name) {
            return Ok(host.clone());
        }

        let url = format!("{}{}/{}", self.control_url, endpoints::INDEXES, name);
        debug!(index = %name, "Resolving Pinecone index host");
        let described: DescribeIndexResponse =
            send_json(SERVICE, self.authorized(self.client.get(&url), api_key)).await?;

        let host = base_url(&described.host);
        self.hosts.write().await.insert(name.to_string(), host.clone());
        Ok(host)
    }
}

fn query_body(request: &VectorQuery, default_namespace: Option<&str>) -> Value {
    let mut body = json!({
        "vector": request.vector,
        "topK": request.top_k,
        "includeMetadata": request.include_metadata.unwrap_or(true),
        "includeValues": false,
    });
    if let Some(filter) = &request.filter {
        body["filter"] = filter.clone();
    }
    if let Some(namespace) = request.namespace.as_deref().or(default_namespace) {
        body["namespace"] = json!(namespace);
    }
    body
}

fn upsert_body(request: &VectorUpsert, default_namespace: Option<&str>) -> Value {
    let mut body = json!({ "vectors": request.vectors });
    if let Some(namespace) = request.namespace.as_deref().or(default_namespace) {
        body["namespace"] = json!(namespace);
    }
    body
}

/// Hosts come back bare (`idx-abc.svc.pinecone.io`); give them a scheme
fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use bridge_core::VectorRecord;

    fn query(index: Option<&str>) -> VectorQuery {
        VectorQuery {
            vector: vec![0.1, 0.2],
            top_k: 3,
            index_name: index.map(String::from),
            filter: None,
            namespace: None,
            include_metadata: None,
        }
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("idx.svc.pinecone.io"), "https://idx.svc.pinecone.io");
        assert_eq!(base_url("http://localhost:5081/"), "http://localhost:5081");
    }

    #[test]
    fn test_query_body() {
        let mut request = query(None);
        request.filter = Some(json!({"genre": {"$eq": "drama"}}));

        let body = query_body(&request, Some("prod"));
        assert_eq!(body["topK"], 3);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["filter"]["genre"]["$eq"], "drama");
        assert_eq!(body["namespace"], "prod");
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = PineconeClient::new(None, Duration::from_secs(1)).unwrap();
        let err = client.query(&query(Some("docs"))).await.unwrap_err();
        assert_eq!(
            err,
            AdapterError::not_configured(SERVICE, "PINECONE_API_KEY is not set")
        );
    }

    #[tokio::test]
    async fn test_missing_index_name() {
        let client = PineconeClient::new(Some("key".into()), Duration::from_secs(1)).unwrap();
        let err = client.query(&query(None)).await.unwrap_err();
        assert!(matches!(err, AdapterError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_query_resolves_host_then_queries() {
        let data_plane = spawn(Router::new().route(
            "/query",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["api-key"], "secret");
                assert_eq!(body["topK"], 3);
                Json(json!({
                    "matches": [
                        {"id": "a", "score": 0.9, "values": [], "metadata": {"title": "A"}},
                        {"id": "b", "score": 0.5}
                    ],
                    "namespace": ""
                }))
            }),
        ))
        .await;

        let host = data_plane.clone();
        let control = spawn(Router::new().route(
            "/indexes/:name",
            get(move |Path(name): Path<String>| {
                let host = host.clone();
                async move {
                    assert_eq!(name, "docs");
                    Json(json!({"name": name, "host": host}))
                }
            }),
        ))
        .await;

        let client = PineconeClient::new(Some("secret".into()), Duration::from_secs(5)).unwrap()
            .with_control_url(&control)
            .with_default_index("docs");

        let response = client.query(&query(None)).await.unwrap();
        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].metadata, Some(json!({"title": "A"})));
        assert_eq!(client.hosts.read().await.get("docs"), Some(&data_plane));
    }

    #[tokio::test]
    async fn test_upsert_reports_count() {
        let data_plane = spawn(Router::new().route(
            "/vectors/upsert",
            post(|Json(body): Json<Value>| async move {
                let n = body["vectors"].as_array().map(|v| v.len()).unwrap_or(0);
                Json(json!({"upsertedCount": n}))
            }),
        ))
        .await;

        let client = PineconeClient::new(Some("secret".into()), Duration::from_secs(5)).unwrap()
            .with_index_host(&data_plane);
        let request = VectorUpsert {
            vectors: vec![
                VectorRecord { id: "a".into(), values: vec![0.1], metadata: None },
                VectorRecord { id: "b".into(), values: vec![0.2], metadata: Some(json!({"k": 1})) },
            ],
            index_name: None,
            namespace: None,
        };

        assert_eq!(client.upsert(&request).await.unwrap().count, 2);
    }

    #[tokio::test]
    async fn test_upstream_rejection() {
        let data_plane = spawn(Router::new().route(
            "/query",
            post(|| async { (StatusCode::UNAUTHORIZED, "Invalid API key") }),
        ))
        .await;

        let client = PineconeClient::new(Some("wrong".into()), Duration::from_secs(5)).unwrap()
            .with_index_host(&data_plane);
        let err = client.query(&query(None)).await.unwrap_err();
        assert_eq!(
            err,
            AdapterError::Upstream {
                service: SERVICE,
                status: 401,
                body: "Invalid API key".into()
            }
        );
    }
}
