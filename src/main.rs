//! Logging proxy binary.
//!
//! ```text
//!     Client ──▶ dispatcher (one per port) ──▶ /<resource>/… ──▶ forward engine ──▶ upstream
//!                                                   │
//!                                                   ▼
//!                                     transaction logger ──▶ <log_root>/<resource>/
//!                                                              ├── cc/cccc/<id>.log
//!                                                              └── <resource>_yyyyMMdd.log
//! ```

use clap::Parser;
use std::path::PathBuf;

use logging_proxy::config::validation::validate_config;
use logging_proxy::config::{load_config, ConfigError, ProxyConfig};
use logging_proxy::lifecycle::shutdown_signal;
use logging_proxy::observability::{logging, metrics};
use logging_proxy::ProxyEndpoint;

#[derive(Parser)]
#[command(name = "logging-proxy")]
#[command(about = "Reverse proxy that logs every exchange per content id", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logging-proxy starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if cli.check {
        validate_config(&config).map_err(ConfigError::Validation)?;
        tracing::info!(resources = config.resources.len(), "Configuration is valid");
        return Ok(());
    }

    let endpoint = ProxyEndpoint::new(config)?;

    for addr in endpoint.start().await? {
        tracing::info!(address = %addr, "Listening for connections");
    }

    shutdown_signal().await;
    endpoint.stop().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
