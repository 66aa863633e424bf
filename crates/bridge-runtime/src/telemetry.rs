//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber: an `EnvFilter` from `RUST_LOG`
//! (falling back to the configured level) plus either pretty console output
//! or JSON lines.

use crate::config::BridgeConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),

    #[error("failed to install subscriber: {0}")]
    Init(String),
}

/// Build the filter the subscriber uses.
pub fn env_filter(config: &BridgeConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter(e.to_string()))
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed; callers that may run twice
/// (tests, hot reload) can ignore the error.
pub fn init_logging(config: &BridgeConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::Init(e.to_string()))?;
    }

    tracing::info!(
        extension_id = %config.extension_id,
        json = config.json_logs,
        "Bridge logging initialized"
    );
    Ok(())
}
