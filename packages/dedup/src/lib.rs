#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address deduplication across overlapping queries.
//!
//! Two records are the same address when their normalized address lines
//! match and their coordinates are within `epsilon` degrees of each other
//! on both axes. The first record seen wins.
//!
//! Accepted points are kept in an R-tree so each check only compares
//! against neighbours inside the `±epsilon` envelope.

use std::sync::{Mutex, PoisonError};

use area_addresses_address_models::normalize_address;
use rstar::{AABB, RTree, RTreeObject};

/// Default proximity threshold in degrees (about 22 m of latitude).
pub const DEFAULT_EPSILON: f64 = 0.0002;

struct AcceptedAddress {
    key: String,
    point: [f64; 2],
}

impl RTreeObject for AcceptedAddress {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Incremental seen-set of accepted addresses.
///
/// Shared by reference between concurrent tasks; each
/// [`Deduplicator::try_accept`] check-and-insert is atomic.
pub struct Deduplicator {
    epsilon: f64,
    accepted: Mutex<RTree<AcceptedAddress>>,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("epsilon", &self.epsilon)
            .field("accepted", &self.len())
            .finish()
    }
}

impl Deduplicator {
    /// Creates an empty deduplicator. A negative or non-finite `epsilon`
    /// is treated as zero.
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        let epsilon = if epsilon.is_finite() {
            epsilon.max(0.0)
        } else {
            0.0
        };

        Self {
            epsilon,
            accepted: Mutex::new(RTree::new()),
        }
    }

    /// The proximity threshold in degrees.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Records `address` at `(lat, lng)` unless an equivalent address was
    /// already accepted nearby.
    ///
    /// Returns `true` if the address is new and now recorded, `false` if it
    /// is a duplicate.
    pub fn try_accept(&self, address: &str, lat: f64, lng: f64) -> bool {
        let key = normalize_address(address);
        let envelope = AABB::from_corners(
            [lng - self.epsilon, lat - self.epsilon],
            [lng + self.epsilon, lat + self.epsilon],
        );

        let mut accepted = self.accepted.lock().unwrap_or_else(PoisonError::into_inner);

        let duplicate = accepted
            .locate_in_envelope_intersecting(&envelope)
            .any(|existing| existing.key == key);

        if duplicate {
            log::trace!("Duplicate address \"{key}\" at ({lat:.6},{lng:.6})");
            return false;
        }

        accepted.insert(AcceptedAddress {
            key,
            point: [lng, lat],
        });
        true
    }

    /// Number of accepted addresses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .size()
    }

    /// `true` if nothing has been accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
