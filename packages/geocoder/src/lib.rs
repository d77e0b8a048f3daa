#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding enrichment for collected addresses.
//!
//! Fills missing address line, city, state and postal code fields for a
//! point by reverse lookup against Nominatim / `OpenStreetMap`, configured
//! via the embedded `services/nominatim.toml`.
//!
//! - [`address`] derives a single address line from the many address
//!   components a lookup (or raw OSM tags) can carry, in a fixed priority
//!   order.
//! - [`cache`] memoizes lookups by rounded coordinate or normalized query.
//! - [`enricher`] wraps a service with the cache, a one-retry backoff
//!   policy and bounded-concurrency batches.
//! - [`nominatim`] is the HTTP client.

pub mod address;
pub mod cache;
pub mod enricher;
pub mod nominatim;
pub mod service_registry;

use area_addresses_address_models::LocationInfo;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service is overloaded or down.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Status reported by the service.
        message: String,
    },

    /// The service rejected the request with a non-retryable status.
    #[error("Unexpected HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
}

impl GeocodeError {
    /// Returns `true` if the failure is likely transient and worth one retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::ServiceUnavailable { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::Parse { .. } | Self::Status { .. } => false,
        }
    }
}

/// A forward geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    /// Latitude (WGS84).
    pub lat: f64,
    /// Longitude (WGS84).
    pub lng: f64,
    /// Postal fields of the match.
    pub location: LocationInfo,
    /// The full display string returned by the geocoder.
    pub display_name: Option<String>,
}

/// Point → address lookups.
#[async_trait]
pub trait ReverseGeocodeService: Send + Sync {
    /// Looks up the postal fields for a point.
    ///
    /// Returns `Ok(None)` when the service knows nothing about the point.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn lookup(&self, lat: f64, lng: f64) -> Result<Option<LocationInfo>, GeocodeError>;
}

/// Free-form query → point lookups.
#[async_trait]
pub trait ForwardGeocodeService: Send + Sync {
    /// Resolves a free-form address or place query to its best match.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn search(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError>;
}
