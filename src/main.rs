//! S4 Gateway Server
//!
//! Loads configuration, sets up logging and serves the object API.

use anyhow::Context;
use s4_gateway::{Gateway, GatewayConfig, GatewayServer};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main entry point for the S4 gateway
///
/// # Usage
/// ```bash
/// # Start with default config (s4_gateway.yaml)
/// s4-gateway
///
/// # Start with custom config
/// s4-gateway /path/to/config.yaml
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Get config file path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "s4_gateway.yaml".to_string());

    let config_found = Path::new(&config_path).exists();
    let config = if config_found {
        GatewayConfig::from_file(&config_path)
            .with_context(|| format!("Failed to load configuration from {}", config_path))?
    } else {
        GatewayConfig::default()
    };

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log_level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting S4 gateway");
    if config_found {
        info!("Configuration loaded from: {}", config_path);
    } else {
        warn!("{} not found, using default configuration", config_path);
    }
    info!("  - Canonical host: {}", config.host);
    info!("  - API prefix: {}", config.api_prefix);
    info!("  - Storage backend: {}", config.storage.backend);
    info!("  - Metadata backend: {}", config.metadata.backend);
    info!(
        "  - Footer cache: {} {:?}",
        config.footer_cache.enabled, config.footer_cache.formats
    );

    let addr = config.listen_addr()?;
    let gateway = Gateway::from_config(&config)
        .await
        .context("Failed to initialize gateway")?;

    GatewayServer::new(Arc::new(gateway), config.api_prefix.clone())
        .run(addr)
        .await
        .context("Server error")?;

    Ok(())
}
