//! Request plumbing shared by the service clients

use bridge_core::AdapterError;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client whose every request is bounded by `timeout`
pub(crate) fn client(service: &'static str, timeout: Duration) -> Result<Client, AdapterError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdapterError::transport(service, format!("failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON body, mapping every failure to an [`AdapterError`]
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
) -> Result<T, AdapterError> {
    let response = request
        .send()
        .await
        .map_err(|e| AdapterError::transport(service, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(AdapterError::Upstream {
            service,
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AdapterError::invalid_response(service, e.to_string()))
}
