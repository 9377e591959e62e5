//! Ingress guard server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ ingress layer ──▶ security ──▶ rate limit ──▶ handler
//!                  │  (context,        │            │            │
//!                  │   identity)       └────────────┴─── ApiError┘
//!                  │                                      │
//!                  ◀──────────── normalizer ◀─────────────┘
//!                  │
//!                  └──▶ audit sink, alerts, metrics
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ingress_guard::config::{load_config, ConfigWatcher, GuardConfig};
use ingress_guard::lifecycle::{listen_for_termination, Shutdown};
use ingress_guard::observability::{logging, metrics};
use ingress_guard::HttpServer;

#[derive(Parser)]
#[command(name = "ingress-guard")]
#[command(about = "Security, rate limiting, validation and audit in front of an HTTP API", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long, env = "INGRESS_GUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ingress-guard starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limiting = config.rate_limit.enabled,
        development_mode = config.security.development_mode,
        "Configuration loaded"
    );
    if config.security.development_mode {
        tracing::warn!("Development mode: automated user agents are not blocked");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    listen_for_termination(shutdown.clone());

    HttpServer::new(config)
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
