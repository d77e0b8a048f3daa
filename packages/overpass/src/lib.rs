#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial feature queries for area address collection.
//!
//! The [`SpatialQueryService`] trait is the boundary to the external
//! spatial-data service; [`overpass::OverpassService`] implements it against
//! an Overpass API endpoint configured in `services/overpass.toml`.
//!
//! [`gateway::QueryGateway`] wraps a service with the fixed
//! backoff-and-retry-once policy and turns failures into empty results so a
//! single bad cell never aborts a collection run.

pub mod gateway;
pub mod overpass;
pub mod service_registry;

use area_addresses_address_models::RawCandidate;
use area_addresses_geometry_models::BoundingBox;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from spatial feature queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service asked us to slow down (HTTP 429).
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service is overloaded or timed out server-side.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Status or remark reported by the service.
        message: String,
    },

    /// The service rejected the request with a non-retryable status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

impl QueryError {
    /// Returns `true` if the failure is likely transient and worth one retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::ServiceUnavailable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Status { .. } | Self::Parse { .. } => false,
        }
    }
}

/// Which kinds of features a query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFilter {
    /// Anything carrying a house number, plus building outlines.
    #[default]
    AddressBearing,
    /// Building outlines only.
    Buildings,
}

/// An external service that returns point features inside a bounding box.
///
/// Implementations must return `Ok(vec![])` rather than an error when the
/// box simply contains nothing.
#[async_trait]
pub trait SpatialQueryService: Send + Sync {
    /// Returns the features inside `bbox` matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the request fails or the response cannot be
    /// parsed.
    async fn find_features(
        &self,
        bbox: &BoundingBox,
        filter: FeatureFilter,
    ) -> Result<Vec<RawCandidate>, QueryError>;
}
