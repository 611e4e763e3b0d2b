//! Configuration Loader
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. TOML file (`config/bridge.toml` when present, or an explicit path)
//! 3. `BRIDGE__SECTION__KEY` environment variables
//! 4. the conventional backend variables (`PINECONE_API_KEY`, `NOTION_API_KEY`, ...)
//!
//! Call [`load_environment`] early in `main()` so a local `.env` file is
//! visible to step 3 and 4.

use crate::error::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Default config file, resolved relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/bridge";

/// Prefix for structured environment overrides
pub const ENV_PREFIX: &str = "BRIDGE";

/// How outcomes are routed to streaming connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Every outcome goes to every open connection
    #[default]
    Broadcast,
    /// Outcomes go only to the connection named by the invocation
    Origin,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::Broadcast => write!(f, "broadcast"),
            DeliveryMode::Origin => write!(f, "origin"),
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broadcast" => Ok(DeliveryMode::Broadcast),
            "origin" => Ok(DeliveryMode::Origin),
            other => Err(format!(
                "unknown delivery mode '{}', expected broadcast or origin",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub backends: BackendSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub keepalive_secs: u64,
    /// Events buffered per streaming connection before writes start failing
    pub channel_capacity: usize,
    pub delivery: DeliveryMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendSettings {
    pub timeout_secs: u64,
    pub pinecone: PineconeSettings,
    pub notion: NotionSettings,
}

impl BackendSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PineconeSettings {
    pub api_key: Option<String>,
    pub default_index: Option<String>,
    /// Fixed data-plane host; skips the control-plane index lookup
    pub index_host: Option<String>,
    pub control_url: String,
    pub api_version: String,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
}

impl Settings {
    /// Load settings from defaults, a config file and the environment.
    ///
    /// `path` replaces the default `config/bridge.toml`, which is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:3001")?
            .set_default("server.keepalive_secs", 15)?
            .set_default("server.channel_capacity", 64)?
            .set_default("server.delivery", "broadcast")?
            .set_default("backends.timeout_secs", 30)?
            .set_default("backends.pinecone.control_url", "https://api.pinecone.io")?
            .set_default("backends.pinecone.api_version", "2024-07")?
            .set_default("backends.notion.base_url", "https://api.notion.com/v1")?
            .set_default("backends.notion.api_version", "2022-06-28")?;

        builder = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                builder.add_source(File::from(path))
            }
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("backends.pinecone.api_key", env_var("PINECONE_API_KEY"))?
            .set_override_option(
                "backends.pinecone.default_index",
                env_var("PINECONE_INDEX_NAME").or_else(|| env_var("PINECONE_INDEX")),
            )?
            .set_override_option("backends.pinecone.index_host", env_var("PINECONE_INDEX_HOST"))?
            .set_override_option(
                "backends.notion.api_key",
                env_var("NOTION_API_KEY").or_else(|| env_var("NOTION_TOKEN")),
            )?
            .build()?
            .try_deserialize()?;

        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.server.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "server.channel_capacity".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.backends.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "backends.timeout_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Load a `.env` file from the working directory (or a parent).
///
/// Existing environment variables are never overridden. Returns the path
/// that was loaded, or None if no file was found.
pub fn load_environment() -> Option<String> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!(path = %path.display(), "Loaded environment file");
            Some(path.display().to_string())
        }
        Err(e) if e.not_found() => {
            debug!("No environment file found, using existing environment");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse environment file");
            None
        }
    }
}
