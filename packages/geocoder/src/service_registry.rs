//! Compile-time embedded Nominatim endpoint configuration.
//!
//! The endpoint is defined in `services/nominatim.toml` and embedded at
//! compile time. Set `NOMINATIM_URL` to point at a self-hosted instance.

use std::time::Duration;

use serde::Deserialize;

use crate::enricher::EnricherConfig;

/// Environment variable that overrides the configured base URL.
pub const BASE_URL_ENV: &str = "NOMINATIM_URL";

/// Nominatim endpoint configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct NominatimSettings {
    /// Unique identifier (`"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API base URL without the endpoint path.
    pub base_url: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Client-side HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Fixed wait before the single retry, in milliseconds.
    pub backoff_ms: u64,
    /// Lookups issued concurrently per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches in milliseconds.
    #[serde(default)]
    pub batch_delay_ms: u64,
    /// Decimal places kept in coordinate cache keys.
    #[serde(default = "default_cache_precision")]
    pub cache_precision: u32,
}

const fn default_batch_size() -> usize {
    5
}

const fn default_cache_precision() -> u32 {
    5
}

impl NominatimSettings {
    /// Client-side HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Enricher tuning derived from these settings.
    #[must_use]
    pub const fn enricher_config(&self) -> EnricherConfig {
        EnricherConfig {
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// Returns the embedded Nominatim settings with any environment override
/// applied.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (a compile-time guarantee since
/// the file is embedded and covered by tests).
#[must_use]
pub fn settings() -> NominatimSettings {
    let mut settings: NominatimSettings = toml::de::from_str(NOMINATIM_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse nominatim service config: {e}"));

    if let Ok(url) = std::env::var(BASE_URL_ENV)
        && !url.trim().is_empty()
    {
        settings.base_url = url.trim().trim_end_matches('/').to_string();
    }

    settings
}
