//! Muse bot - Main entry point.

use anyhow::Result;
use muse_channels::start;
use muse_common::config::Config;
use muse_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration, apply environment overrides and validate
    let config = Config::load_and_validate()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Muse bot v{}", env!("CARGO_PKG_VERSION"));
    for warning in config.warnings() {
        tracing::warn!("{warning}");
    }

    start(config).await
}
