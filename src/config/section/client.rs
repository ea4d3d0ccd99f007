//! `[client]` section configuration.
//!
//! Settings for `listen`, the hot reload client.
//!
//! # Example
//!
//! ```toml
//! [client]
//! url = "http://localhost:8080"   # Page origin of the running server
//! page = "public/index.html"      # Page whose `_serve:fname` is "current"
//!
//! [client.reconnect]
//! max_attempts = 5                # 0 = stop at the first dropped connection
//! initial_delay_ms = 500
//! max_delay_ms = 8000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::hmr::ReconnectPolicy;

/// Hot reload client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Page origin; the socket URL is derived from it.
    pub url: Option<String>,

    /// HTML page providing the current-page marker.
    pub page: Option<PathBuf>,

    /// Reconnect backoff.
    pub reconnect: ReconnectConfig,
}

/// Reconnect backoff, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
        }
    }
}

impl From<ReconnectConfig> for ReconnectPolicy {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}
