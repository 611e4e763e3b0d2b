//! Notion Pages Client
//!
//! - `GET {base}/pages/{page_id}` with `Authorization: Bearer {NOTION_API_KEY}`
//!   and `Notion-Version: 2022-06-28`

use crate::http::{client, send_json};
use bridge_core::config::NotionSettings;
use bridge_core::{AdapterError, DocumentRecord};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const SERVICE: &str = "notion";

pub mod endpoints {
    pub const BASE_URL: &str = "https://api.notion.com/v1";
    pub const PAGES: &str = "/pages";
    pub const API_VERSION: &str = "2022-06-28";
}

pub struct NotionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    api_version: String,
}

impl NotionClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, AdapterError> {
        Ok(Self {
            client: client(SERVICE, timeout)?,
            api_key,
            base_url: endpoints::BASE_URL.to_string(),
            api_version: endpoints::API_VERSION.to_string(),
        })
    }

    pub fn from_settings(settings: &NotionSettings, timeout: Duration) -> Result<Self, AdapterError> {
        let mut client = Self::new(settings.api_key.clone(), timeout)?.with_base_url(&settings.base_url);
        client.api_version = settings.api_version.clone();
        Ok(client)
    }

    pub fn with_base_url(mut self, url: impl AsRef<str>) -> Self {
        self.base_url = url.as_ref().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Retrieve a page object by ID (dashed or undashed UUID form)
    pub async fn fetch_page(&self, page_id: &str) -> Result<DocumentRecord, AdapterError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AdapterError::not_configured(SERVICE, "NOTION_API_KEY is not set"))?;
        let page_id = check_page_id(page_id)?;

        let url = format!("{}{}/{}", self.base_url, endpoints::PAGES, page_id);
        debug!(url = %url, "Notion page fetch");

        let request = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Notion-Version", &self.api_version)
            .header("Accept", "application/json");

        send_json(SERVICE, request).await
    }
}

/// Page IDs go into the URL path, so only UUID characters are accepted
fn check_page_id(page_id: &str) -> Result<&str, AdapterError> {
    let page_id = page_id.trim();
    if page_id.is_empty() {
        return Err(AdapterError::InvalidInput("pageId must not be empty".into()));
    }
    if !page_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AdapterError::InvalidInput(format!(
            "pageId '{}' contains invalid characters",
            page_id
        )));
    }
    Ok(page_id)
}
