//! Compile-time embedded Overpass endpoint configuration.
//!
//! The endpoint is defined in `services/overpass.toml` and embedded at
//! compile time. Set `OVERPASS_URL` to point at a different instance.

use std::time::Duration;

use serde::Deserialize;

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "OVERPASS_URL";

/// Overpass endpoint configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassSettings {
    /// Unique identifier (`"overpass"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Interpreter endpoint URL.
    pub base_url: String,
    /// Server-side query timeout in seconds.
    pub query_timeout_secs: u64,
    /// Client-side HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Fixed wait before the single retry, in milliseconds.
    pub backoff_ms: u64,
}

impl OverpassSettings {
    /// Client-side HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Wait before retrying.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

const OVERPASS_TOML: &str = include_str!("../services/overpass.toml");

/// Returns the embedded Overpass settings with any environment override
/// applied.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (a compile-time guarantee since
/// the file is embedded and covered by tests).
#[must_use]
pub fn settings() -> OverpassSettings {
    let mut settings: OverpassSettings = toml::de::from_str(OVERPASS_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse overpass service config: {e}"));

    if let Ok(url) = std::env::var(BASE_URL_ENV)
        && !url.trim().is_empty()
    {
        settings.base_url = url.trim().to_string();
    }

    settings
}
