//! Run tuning for the collection pipeline.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes:
//!
//! ```toml
//! cell_edge_m = 500.0
//! cell_concurrency = 3
//! run_timeout_secs = 120
//! ```

use std::path::Path;
use std::time::Duration;

use area_addresses_geocoder::enricher::EnricherConfig;
use area_addresses_grid::{
    DEFAULT_CELL_EDGE_M, DEFAULT_MAX_CELLS, DEFAULT_METERS_PER_DEGREE, GridConfig,
};
use area_addresses_overpass::FeatureFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating a [`CollectConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this struct.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid value for {field}: {message}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

/// Tuning for one [`crate::orchestrator::CollectionOrchestrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectConfig {
    /// Target query cell edge in meters.
    pub cell_edge_m: f64,
    /// Conversion from meters to degrees for the cell edge.
    pub meters_per_degree: f64,
    /// Upper bound on planned cells.
    pub max_cells: usize,
    /// Regions whose bounding box spans at most this many degrees on both
    /// axes are fetched with a single query instead of a grid.
    pub single_query_max_span: f64,
    /// Cell queries in flight at once.
    pub cell_concurrency: usize,
    /// Reverse lookups in flight at once (the enrichment batch size).
    pub enrich_concurrency: usize,
    /// Pause between enrichment batches in milliseconds.
    pub enrich_batch_delay_ms: u64,
    /// Wait before retrying a failed cell query, in milliseconds.
    pub query_backoff_ms: u64,
    /// Wait before retrying a failed reverse lookup, in milliseconds.
    pub geocode_backoff_ms: u64,
    /// Decimal places kept in geocode cache keys.
    pub cache_precision: u32,
    /// Dedup proximity threshold in degrees.
    pub dedup_epsilon: f64,
    /// Raw candidates processed per run before the rest is skipped.
    pub max_candidates: usize,
    /// Overall run deadline in seconds. `None` means no deadline.
    pub run_timeout_secs: Option<u64>,
    /// Keep one geocode cache for the orchestrator's lifetime instead of
    /// starting each run empty.
    pub retain_geocode_cache: bool,
    /// Which features to ask the spatial service for.
    pub feature_filter: FeatureFilter,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            cell_edge_m: DEFAULT_CELL_EDGE_M,
            meters_per_degree: DEFAULT_METERS_PER_DEGREE,
            max_cells: DEFAULT_MAX_CELLS,
            single_query_max_span: 0.015,
            cell_concurrency: 4,
            enrich_concurrency: 5,
            enrich_batch_delay_ms: 200,
            query_backoff_ms: 2_000,
            geocode_backoff_ms: 1_000,
            cache_precision: 5,
            dedup_epsilon: area_addresses_dedup::DEFAULT_EPSILON,
            max_candidates: 100,
            run_timeout_secs: None,
            retain_geocode_cache: false,
            feature_filter: FeatureFilter::default(),
        }
    }
}

impl CollectConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::de::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise
    /// the same errors as [`Self::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("Loaded collect config from {}", path.display());
        Self::from_toml_str(&input)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("cell_edge_m", self.cell_edge_m)?;
        positive("meters_per_degree", self.meters_per_degree)?;
        at_least_one("max_cells", self.max_cells)?;
        at_least_one("cell_concurrency", self.cell_concurrency)?;
        at_least_one("enrich_concurrency", self.enrich_concurrency)?;
        at_least_one("max_candidates", self.max_candidates)?;

        if !(self.single_query_max_span.is_finite() && self.single_query_max_span >= 0.0) {
            return Err(invalid(
                "single_query_max_span",
                format!("must be a non-negative number, got {}", self.single_query_max_span),
            ));
        }
        if !(self.dedup_epsilon.is_finite() && self.dedup_epsilon >= 0.0) {
            return Err(invalid(
                "dedup_epsilon",
                format!("must be a non-negative number, got {}", self.dedup_epsilon),
            ));
        }
        if self.cache_precision > 12 {
            return Err(invalid(
                "cache_precision",
                format!("must be at most 12, got {}", self.cache_precision),
            ));
        }
        if self.run_timeout_secs == Some(0) {
            return Err(invalid("run_timeout_secs", "must be positive".to_string()));
        }

        Ok(())
    }

    /// Grid planner settings.
    #[must_use]
    pub fn grid_config(&self) -> GridConfig {
        GridConfig::from_meters(self.cell_edge_m, self.meters_per_degree, self.max_cells)
    }

    /// Enricher settings.
    #[must_use]
    pub const fn enricher_config(&self) -> EnricherConfig {
        EnricherConfig {
            batch_size: self.enrich_concurrency,
            batch_delay: Duration::from_millis(self.enrich_batch_delay_ms),
            backoff: Duration::from_millis(self.geocode_backoff_ms),
        }
    }

    /// Wait before a cell query retry.
    #[must_use]
    pub const fn query_backoff(&self) -> Duration {
        Duration::from_millis(self.query_backoff_ms)
    }

    /// Overall run deadline, if any.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

fn invalid(field: &'static str, message: String) -> ConfigError {
    ConfigError::Invalid { field, message }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive number, got {value}")))
    }
}

fn at_least_one(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        Err(invalid(field, "must be at least 1".to_string()))
    } else {
        Ok(())
    }
}
