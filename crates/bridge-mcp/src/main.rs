//! bridge-server: MCP tool bridge over HTTP+SSE
//!
//!   bridge-server                                # defaults, config/bridge.toml if present
//!   bridge-server --bind 127.0.0.1:3001
//!   bridge-server --config /etc/mcp-bridge.toml --delivery origin
//!
//! Backend credentials come from the environment (or `.env`):
//!   PINECONE_API_KEY, PINECONE_INDEX_NAME, PINECONE_INDEX_HOST, NOTION_API_KEY

use anyhow::{Context, Result};
use bridge_backends::HttpBackend;
use bridge_core::{load_environment, DeliveryMode, Settings};
use bridge_mcp::transport::{HttpSseTransport, HttpState};
use bridge_mcp::{Bridge, SessionManager};
use bridge_tools::{register_builtin_tools, Dispatcher, ToolRegistry};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bridge-server")]
#[command(about = "MCP tool bridge over HTTP+SSE")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides server.bind_addr)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Outcome routing: broadcast (all connections) or origin (issuing connection only)
    #[arg(long)]
    delivery: Option<DeliveryMode>,

    /// Backend call timeout in seconds (overrides backends.timeout_secs)
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    load_environment();
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(bind) = cli.bind {
        settings.server.bind_addr = bind;
    }
    if let Some(delivery) = cli.delivery {
        settings.server.delivery = delivery;
    }
    if let Some(secs) = cli.timeout_secs {
        settings.backends.timeout_secs = secs.max(1);
    }

    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry).context("failed to register tools")?;

    let backend =
        HttpBackend::from_settings(&settings.backends).context("failed to create backend clients")?;
    if !backend.pinecone().is_configured() {
        warn!("PINECONE_API_KEY not set; vector tools will report errors");
    }
    if !backend.notion().is_configured() {
        warn!("NOTION_API_KEY not set; document tools will report errors");
    }

    let dispatcher = Arc::new(
        Dispatcher::new(Arc::new(registry), Arc::new(backend))
            .with_timeout(settings.backends.timeout()),
    );
    let sessions = Arc::new(SessionManager::new());
    let bridge = Arc::new(
        Bridge::new(dispatcher, sessions).with_delivery(settings.server.delivery),
    );

    info!(
        bind = %settings.server.bind_addr,
        delivery = %settings.server.delivery,
        tools = bridge.on_list_tools().len(),
        "Starting bridge-server"
    );

    let state = Arc::new(
        HttpState::new(bridge)
            .with_keepalive(Duration::from_secs(settings.server.keepalive_secs.max(1)))
            .with_channel_capacity(settings.server.channel_capacity),
    );

    HttpSseTransport::new(settings.server.bind_addr)
        .serve(state, shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
