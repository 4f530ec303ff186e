//! livedash daemon - live stream stats bridge
//!
//! Attaches to one upstream live channel at a time (through a WebSocket
//! relay), aggregates viewer/like/share/gift statistics and fans normalized
//! events out to every connected dashboard over WebSocket.
//!
//! Dashboards pick the channel themselves by sending
//! `{"type": "connect", "username": "..."}`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use livedash_broadcaster::ClientManager;
use livedash_daemon::{DaemonConfig, Gateway, RelayUpstream, SessionManager};

/// livedash daemon - bridges a live channel to dashboard clients
#[derive(Parser, Debug)]
#[command(name = "livedash-daemon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "LIVEDASH_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gateway listen address (overrides config)
    #[arg(short = 'b', long, env = "LIVEDASH_BIND", value_name = "ADDR")]
    bind: Option<String>,

    /// Relay URL template containing {channel} (overrides config)
    #[arg(long, env = "LIVEDASH_RELAY_URL", value_name = "URL")]
    relay_url: Option<String>,

    /// Channel to connect to at startup (overrides config)
    #[arg(long, value_name = "NAME")]
    channel: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long, env = "LIVEDASH_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .init();

    info!("📡 Starting livedash daemon v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).context("Failed to load configuration")?;
    info!("📋 Configuration loaded from {}", config.config_path.display());

    let upstream = Arc::new(RelayUpstream::new(config.upstream.relay_url.clone()));
    let session = Arc::new(SessionManager::new(upstream, ClientManager::new()));

    let gateway = Gateway::bind(&config.bind_address, Arc::clone(&session), config.client_queue_capacity)
        .await
        .context("Failed to start dashboard gateway")?;

    if let Some(channel) = config.default_channel.as_deref() {
        info!("Auto-connecting to @{}", channel);
        if let Err(e) = session.request_connect(channel).await {
            warn!("Startup connect failed: {}", e);
        }
    }

    info!("🚀 livedash daemon ready on {}", config.bind_address);

    tokio::select! {
        result = gateway.run() => {
            if let Err(e) = result {
                error!("Gateway error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Received shutdown signal");
        }
    }

    info!("🧹 Shutting down...");
    session.request_disconnect().await;
    info!("👋 livedash daemon stopped");

    Ok(())
}

/// Config file plus command-line overrides
fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match &args.config {
        Some(path) => DaemonConfig::load_from(path)?,
        None => DaemonConfig::load()?,
    };

    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(relay_url) = &args.relay_url {
        config.upstream.relay_url = relay_url.clone();
    }
    if let Some(channel) = &args.channel {
        config.default_channel = Some(channel.clone());
    }

    config.validate()?;
    Ok(config)
}
