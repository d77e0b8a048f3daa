//! Retrying front door to a [`SpatialQueryService`].
//!
//! The gateway holds no per-call state, so one instance can be cloned into
//! any number of concurrent cell queries. Concurrency itself is bounded by
//! the caller.

use std::sync::Arc;
use std::time::Duration;

use area_addresses_address_models::RawCandidate;
use area_addresses_geometry_models::BoundingBox;

use crate::{FeatureFilter, QueryError, SpatialQueryService};

/// Result of fetching one cell.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The service returned at least one feature.
    Found(Vec<RawCandidate>),
    /// The service answered but the box contains nothing.
    NoData,
    /// The request failed even after the retry.
    Failed(QueryError),
}

impl FetchOutcome {
    /// Consumes the outcome, yielding an empty list for anything but
    /// [`FetchOutcome::Found`].
    #[must_use]
    pub fn into_candidates(self) -> Vec<RawCandidate> {
        match self {
            Self::Found(candidates) => candidates,
            Self::NoData | Self::Failed(_) => vec![],
        }
    }

    /// `true` if the request failed.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Issues feature queries with a fixed backoff and a single retry.
#[derive(Clone)]
pub struct QueryGateway {
    service: Arc<dyn SpatialQueryService>,
    filter: FeatureFilter,
    backoff: Duration,
}

impl QueryGateway {
    /// Creates a gateway over `service`.
    #[must_use]
    pub fn new(service: Arc<dyn SpatialQueryService>, filter: FeatureFilter, backoff: Duration) -> Self {
        Self {
            service,
            filter,
            backoff,
        }
    }

    /// Fetches the candidates inside `bbox`.
    ///
    /// A transient failure (rate limit, overloaded server, connection or
    /// timeout) is retried exactly once after the configured backoff. Any
    /// remaining failure is reported as [`FetchOutcome::Failed`] and never
    /// propagated.
    pub async fn fetch_candidates(&self, bbox: &BoundingBox) -> FetchOutcome {
        let mut retried = false;

        loop {
            match self.service.find_features(bbox, self.filter).await {
                Ok(candidates) if candidates.is_empty() => return FetchOutcome::NoData,
                Ok(candidates) => return FetchOutcome::Found(candidates),
                Err(e) if e.is_transient() && !retried => {
                    log::warn!(
                        "Query for ({:.5},{:.5},{:.5},{:.5}) failed: {e}; retrying in {:?}",
                        bbox.south,
                        bbox.west,
                        bbox.north,
                        bbox.east,
                        self.backoff
                    );
                    retried = true;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => {
                    log::warn!(
                        "Giving up on ({:.5},{:.5},{:.5},{:.5}): {e}",
                        bbox.south,
                        bbox.west,
                        bbox.north,
                        bbox.east
                    );
                    return FetchOutcome::Failed(e);
                }
            }
        }
    }
}
