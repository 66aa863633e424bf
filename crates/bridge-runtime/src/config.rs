//! Bridge configuration with validation.

use serde::{Deserialize, Serialize};
use std::env;

/// Extension id used when nothing else is configured.
pub const DEFAULT_EXTENSION_ID: &str = "bridge-extension";

/// Default depth of the native messaging inbox.
pub const DEFAULT_NATIVE_QUEUE: usize = 256;

/// Default backend the fetch primitive talks to.
pub const DEFAULT_BACKEND_URL: &str = "https://csfloat.com";

/// Runtime configuration shared by every context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Id this runtime answers to and the default target of native sends.
    pub extension_id: String,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON formatted logs.
    pub json_logs: bool,

    /// Native messaging inbox depth.
    pub native_queue: usize,

    /// Base URL for backend calls made by handlers.
    pub backend_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            extension_id: DEFAULT_EXTENSION_ID.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            native_queue: DEFAULT_NATIVE_QUEUE,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRIDGE_EXTENSION_ID`: Extension id (default: bridge-extension)
    /// - `BRIDGE_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `BRIDGE_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `BRIDGE_NATIVE_QUEUE`: Native inbox depth (default: 256)
    /// - `BRIDGE_BACKEND_URL`: Backend base URL (default: https://csfloat.com)
    ///
    /// Unparseable numbers fall back to their defaults; call
    /// [`validate`](Self::validate) before use.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            extension_id: lookup("BRIDGE_EXTENSION_ID").unwrap_or(defaults.extension_id),

            log_level: lookup("BRIDGE_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: lookup("BRIDGE_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),

            native_queue: lookup("BRIDGE_NATIVE_QUEUE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.native_queue),

            backend_url: lookup("BRIDGE_BACKEND_URL").unwrap_or(defaults.backend_url),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension_id.trim().is_empty() {
            return Err(ConfigError::EmptyExtensionId);
        }

        if self.native_queue == 0 {
            return Err(ConfigError::InvalidCapacity(
                "native_queue cannot be 0".into(),
            ));
        }

        if self.backend_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend_url cannot be empty".into()));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No extension id to address native sends to
    #[error("extension id cannot be empty")]
    EmptyExtensionId,
    /// Invalid queue capacity
    #[error("invalid capacity: {0}")]
    InvalidCapacity(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
