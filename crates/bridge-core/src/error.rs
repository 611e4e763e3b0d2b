//! Error types shared across the bridge

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a Backend Adapter call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("{service} is not configured: {reason}")]
    NotConfigured {
        service: &'static str,
        reason: String,
    },

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    #[error("backend call timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("invalid response from {service}: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AdapterError {
    /// Create a not-configured error
    pub fn not_configured(service: &'static str, reason: impl Into<String>) -> Self {
        AdapterError::NotConfigured {
            service,
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport(service: &'static str, message: impl Into<String>) -> Self {
        AdapterError::Transport {
            service,
            message: message.into(),
        }
    }

    /// Create an invalid-response error
    pub fn invalid_response(service: &'static str, message: impl Into<String>) -> Self {
        AdapterError::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// True when retrying later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AdapterError::Timeout(_) | AdapterError::Transport { .. } => true,
            AdapterError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Configuration loading failure
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AdapterError::not_configured("pinecone", "PINECONE_API_KEY is not set");
        assert_eq!(
            err.to_string(),
            "pinecone is not configured: PINECONE_API_KEY is not set"
        );

        let err = AdapterError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "backend call timed out after 30s");
    }

    #[test]
    fn test_transient_classification() {
        assert!(AdapterError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(AdapterError::Upstream {
            service: "notion",
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!AdapterError::Upstream {
            service: "notion",
            status: 404,
            body: String::new()
        }
        .is_transient());
        assert!(!AdapterError::InvalidInput("bad".into()).is_transient());
    }
}
