//! bridge-backends: HTTP implementations of the Backend Adapter
//!
//! | Capability | Service | Client |
//! |------------|---------|--------|
//! | vector query / upsert | Pinecone | [`PineconeClient`] |
//! | document fetch | Notion | [`NotionClient`] |
//!
//! [`HttpBackend`] composes both behind the [`bridge_core::Backend`] trait.

pub mod notion;
pub mod pinecone;

mod http;

pub use notion::NotionClient;
pub use pinecone::PineconeClient;

use async_trait::async_trait;
use bridge_core::config::BackendSettings;
use bridge_core::{
    AdapterError, Backend, DocumentRecord, QueryResponse, UpsertResponse, VectorQuery,
    VectorUpsert,
};

pub struct HttpBackend {
    pinecone: PineconeClient,
    notion: NotionClient,
}

impl HttpBackend {
    pub fn new(pinecone: PineconeClient, notion: NotionClient) -> Self {
        Self { pinecone, notion }
    }

    pub fn from_settings(settings: &BackendSettings) -> Result<Self, AdapterError> {
        let timeout = settings.timeout();
        Ok(Self::new(
            PineconeClient::from_settings(&settings.pinecone, timeout)?,
            NotionClient::from_settings(&settings.notion, timeout)?,
        ))
    }

    pub fn pinecone(&self) -> &PineconeClient {
        &self.pinecone
    }

    pub fn notion(&self) -> &NotionClient {
        &self.notion
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn vector_query(&self, request: VectorQuery) -> Result<QueryResponse, AdapterError> {
        self.pinecone.query(&request).await
    }

    async fn vector_upsert(&self, request: VectorUpsert) -> Result<UpsertResponse, AdapterError> {
        self.pinecone.upsert(&request).await
    }

    async fn fetch_document(&self, document_id: &str) -> Result<DocumentRecord, AdapterError> {
        self.notion.fetch_page(document_id).await
    }
}
