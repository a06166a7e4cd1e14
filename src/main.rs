//! RAWG API proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ trace ─▶ CORS ─▶ origin guard ─▶ rate limit
//!                                                                      │
//!                                                                      ▼
//!     Client Response                                           route dispatch
//!     ◀────────────── JSON pass-through / 400 description ◀── url builder + client ◀──── RAWG API
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rawg_proxy::config::load_config;
use rawg_proxy::observability::{logging, metrics};
use rawg_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "rawg-proxy")]
#[command(about = "Proxy for the RAWG video game API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "RAWG_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Validate configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    if cli.check {
        println!("Configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability);

    tracing::info!("rawg-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        api_key = %config.upstream.api_key,
        production_domain = ?config.cors.production_domain,
        rate_limit_enabled = config.rate_limit.enabled,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
