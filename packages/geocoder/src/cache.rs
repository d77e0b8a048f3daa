//! In-memory geocode cache.
//!
//! Reverse lookups are keyed by coordinates rounded to a fixed number of
//! decimal places, forward lookups by the normalized query text. Misses
//! (`None`) are cached too so an unknown location is asked about once.
//! Errors are never cached.
//!
//! The cache is safe to share between concurrent lookups. When two lookups
//! race on the same key the first insert wins and both callers observe the
//! stored value.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use area_addresses_address_models::{LocationInfo, normalize_address};

use crate::GeocodedPlace;

pub(crate) type CoordKey = (i64, i64);

/// Thread-safe lookup cache.
#[derive(Debug)]
pub struct GeocodeCache {
    scale: f64,
    reverse: Mutex<HashMap<CoordKey, Option<LocationInfo>>>,
    forward: Mutex<HashMap<String, Option<GeocodedPlace>>>,
}

impl Default for GeocodeCache {
    fn default() -> Self {
        Self::new(5)
    }
}

impl GeocodeCache {
    /// Creates an empty cache keeping `precision` decimal places of each
    /// coordinate (5 places is roughly one meter).
    #[must_use]
    pub fn new(precision: u32) -> Self {
        Self {
            scale: 10f64.powi(i32::try_from(precision.min(12)).unwrap_or(12)),
            reverse: Mutex::new(HashMap::new()),
            forward: Mutex::new(HashMap::new()),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn key(&self, lat: f64, lng: f64) -> CoordKey {
        (
            (lat * self.scale).round() as i64,
            (lng * self.scale).round() as i64,
        )
    }

    /// Returns the cached reverse result for a point.
    ///
    /// The outer `Option` is the cache hit; the inner one is the stored
    /// result, which may itself be a miss.
    #[must_use]
    pub fn get_reverse(&self, lat: f64, lng: f64) -> Option<Option<LocationInfo>> {
        let key = self.key(lat, lng);
        self.reverse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Stores a reverse result unless one is already present, returning the
    /// value now held for the key.
    pub fn insert_reverse(
        &self,
        lat: f64,
        lng: f64,
        value: Option<LocationInfo>,
    ) -> Option<LocationInfo> {
        let key = self.key(lat, lng);
        self.reverse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(value)
            .clone()
    }

    /// Returns the cached forward result for a query.
    #[must_use]
    pub fn get_forward(&self, query: &str) -> Option<Option<GeocodedPlace>> {
        let key = normalize_address(query);
        self.forward
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Stores a forward result unless one is already present, returning the
    /// value now held for the query.
    pub fn insert_forward(&self, query: &str, value: Option<GeocodedPlace>) -> Option<GeocodedPlace> {
        let key = normalize_address(query);
        self.forward
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(value)
            .clone()
    }

    /// Number of cached entries across both directions.
    #[must_use]
    pub fn len(&self) -> usize {
        let reverse = self
            .reverse
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let forward = self
            .forward
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        reverse + forward
    }

    /// `true` if nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: &str) -> LocationInfo {
        LocationInfo {
            address_line: line.to_string(),
            ..LocationInfo::default()
        }
    }

    #[test]
    fn nearby_points_share_a_key() {
        let cache = GeocodeCache::new(5);
        cache.insert_reverse(40.123_451, -74.000_001, Some(location("1 Elm St")));

        let hit = cache.get_reverse(40.123_449, -74.000_004).unwrap();
        assert_eq!(hit.unwrap().address_line, "1 Elm St");
        assert!(cache.get_reverse(40.123_5, -74.0).is_none());
    }

    #[test]
    fn misses_are_cached() {
        let cache = GeocodeCache::default();
        cache.insert_reverse(1.0, 2.0, None);
        assert_eq!(cache.get_reverse(1.0, 2.0), Some(None));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_insert_wins() {
        let cache = GeocodeCache::default();
        cache.insert_reverse(1.0, 2.0, Some(location("first")));
        let stored = cache.insert_reverse(1.0, 2.0, Some(location("second")));
        assert_eq!(stored.unwrap().address_line, "first");
    }

    #[test]
    fn forward_queries_are_normalized() {
        let cache = GeocodeCache::default();
        let place = GeocodedPlace {
            lat: 1.0,
            lng: 2.0,
            location: location("1 Elm St"),
            display_name: None,
        };
        cache.insert_forward("  1 ELM   st ", Some(place.clone()));
        assert_eq!(cache.get_forward("1 elm st"), Some(Some(place)));
        assert!(cache.get_forward("2 elm st").is_none());
    }

    #[test]
    fn concurrent_inserts_agree_on_first_value() {
        let cache = std::sync::Arc::new(GeocodeCache::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    cache.insert_reverse(40.0, -74.0, Some(location(&format!("{i} Elm St"))))
                })
            })
            .collect();

        let stored: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().address_line)
            .collect();
        assert!(stored.iter().all(|line| *line == stored[0]));
        assert_eq!(
            cache.get_reverse(40.0, -74.0).unwrap().unwrap().address_line,
            stored[0]
        );
        assert_eq!(cache.len(), 1);
    }
}
