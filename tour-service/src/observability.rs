//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::{Error, Result};

/// Build the env filter for the configured log level
///
/// `RUST_LOG` wins when set; an unparsable level falls back to `info`.
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing
///
/// JSON lines in production, compact human output in development.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = env_filter(&config.service.log_level);

    let result = if config.environment().is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    };
    result.map_err(|e| Error::Unexpected(format!("failed to install tracing subscriber: {}", e)))?;

    tracing::info!(
        service = %config.service.name,
        environment = %config.environment(),
        "Tracing initialized"
    );

    Ok(())
}
