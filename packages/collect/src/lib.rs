#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area-to-address collection.
//!
//! Turns a drawn [`Region`](area_addresses_geometry_models::Region) into a
//! deduplicated list of street addresses:
//!
//! 1. plan query cells over the region (or a single query for small ones),
//! 2. fetch candidates per cell with bounded concurrency,
//! 3. keep only candidates inside the region,
//! 4. reverse-geocode candidates missing postal fields,
//! 5. drop duplicates and candidates with no address text.
//!
//! Per-cell and per-point failures degrade completeness and are counted in
//! the [`orchestrator::CollectionSummary`]; only an invalid region or
//! config, cancellation, or the overall timeout fail a run.

pub mod config;
pub mod orchestrator;
pub mod progress;
pub mod repository;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use area_addresses_geometry::RegionError;
use area_addresses_grid::GridError;
use thiserror::Error;

pub use config::{CollectConfig, ConfigError};
pub use orchestrator::{CollectionOrchestrator, CollectionResult, CollectionSummary};
pub use progress::{NullProgress, Phase, ProgressSink, ProgressSnapshot};

/// Errors that abort a collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The region cannot be collected.
    #[error("Invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    /// The run configuration is invalid.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Cell planning failed.
    #[error("Grid planning failed: {0}")]
    Grid(#[from] GridError),

    /// The caller cancelled the run.
    #[error("Collection cancelled")]
    Cancelled,

    /// The overall run deadline passed.
    #[error("Collection timed out after {secs}s")]
    Timeout {
        /// Configured deadline in seconds.
        secs: u64,
    },
}

/// Shared cancellation flag.
///
/// Clones share the flag. A run checks it at every batch boundary; results
/// of requests already in flight are discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` once [`Self::cancel`] has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
