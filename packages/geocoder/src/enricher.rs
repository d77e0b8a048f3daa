//! Cached, retrying, batched geocoding.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use area_addresses_address_models::LocationInfo;
use futures::StreamExt;

use crate::cache::{CoordKey, GeocodeCache};
use crate::{ForwardGeocodeService, GeocodeError, GeocodedPlace, ReverseGeocodeService};

/// Enricher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnricherConfig {
    /// Lookups issued concurrently in one batch.
    pub batch_size: usize,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
    /// Wait before the single retry of a transient failure.
    pub backoff: Duration,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_delay: Duration::from_millis(200),
            backoff: Duration::from_secs(1),
        }
    }
}

/// Counters accumulated by an enricher.
#[derive(Debug, Default)]
pub struct EnricherStats {
    cache_hits: AtomicU64,
    service_calls: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

/// A point-in-time copy of [`EnricherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnricherStatsSnapshot {
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Requests sent to a service, retries included.
    pub service_calls: u64,
    /// Transient failures that were retried.
    pub retries: u64,
    /// Lookups that ended in an error.
    pub failures: u64,
}

impl EnricherStats {
    /// Copies the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> EnricherStatsSnapshot {
        EnricherStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            service_calls: self.service_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Wraps geocoding services with a shared cache and a retry-once policy.
///
/// Failures never escape: a lookup that still fails after its retry is
/// reported as `None` and counted in [`EnricherStats`].
pub struct GeocodeEnricher {
    reverse: Arc<dyn ReverseGeocodeService>,
    forward: Option<Arc<dyn ForwardGeocodeService>>,
    cache: Arc<GeocodeCache>,
    config: EnricherConfig,
    stats: EnricherStats,
}

impl GeocodeEnricher {
    /// Creates an enricher doing reverse lookups through `reverse`.
    #[must_use]
    pub fn new(
        reverse: Arc<dyn ReverseGeocodeService>,
        cache: Arc<GeocodeCache>,
        config: EnricherConfig,
    ) -> Self {
        Self {
            reverse,
            forward: None,
            cache,
            config,
            stats: EnricherStats::default(),
        }
    }

    /// Enables [`Self::forward_lookup`] through `forward`.
    #[must_use]
    pub fn with_forward(mut self, forward: Arc<dyn ForwardGeocodeService>) -> Self {
        self.forward = Some(forward);
        self
    }

    /// Maximum number of concurrent lookups per batch (at least 1).
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.config.batch_size.max(1)
    }

    /// Pause the caller should leave between batches.
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        self.config.batch_delay
    }

    /// The cache backing this enricher.
    #[must_use]
    pub const fn cache(&self) -> &Arc<GeocodeCache> {
        &self.cache
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> EnricherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Looks up the postal fields of a point.
    ///
    /// Returns `None` when the service has nothing for the point or the
    /// lookup failed twice.
    pub async fn reverse_lookup(&self, lat: f64, lng: f64) -> Option<LocationInfo> {
        if let Some(cached) = self.cache.get_reverse(lat, lng) {
            EnricherStats::bump(&self.stats.cache_hits);
            return cached;
        }

        let result = self
            .with_retry(|| self.reverse.lookup(lat, lng), || format!("({lat:.6},{lng:.6})"))
            .await;

        match result {
            Ok(value) => self.cache.insert_reverse(lat, lng, value),
            Err(e) => {
                log::warn!("Reverse lookup for ({lat:.6},{lng:.6}) failed: {e}");
                EnricherStats::bump(&self.stats.failures);
                None
            }
        }
    }

    /// Resolves a free-form query to its best match.
    ///
    /// Returns `None` if no forward service is configured, nothing matched
    /// or the lookup failed twice.
    pub async fn forward_lookup(&self, query: &str) -> Option<GeocodedPlace> {
        let forward = self.forward.as_ref()?;

        if let Some(cached) = self.cache.get_forward(query) {
            EnricherStats::bump(&self.stats.cache_hits);
            return cached;
        }

        let result = self
            .with_retry(|| forward.search(query), || format!("\"{query}\""))
            .await;

        match result {
            Ok(value) => self.cache.insert_forward(query, value),
            Err(e) => {
                log::warn!("Forward lookup for \"{query}\" failed: {e}");
                EnricherStats::bump(&self.stats.failures);
                None
            }
        }
    }

    /// Reverse-looks-up one batch of points with at most
    /// [`Self::batch_size`] requests in flight.
    ///
    /// Points that share a cache key are looked up once and every caller
    /// receives the same stored value. Results are returned in input order.
    pub async fn lookup_batch(&self, points: &[(f64, f64)]) -> Vec<Option<LocationInfo>> {
        let mut unique: Vec<(f64, f64)> = Vec::with_capacity(points.len());
        let mut slots: HashMap<CoordKey, usize> = HashMap::with_capacity(points.len());

        let slot_of: Vec<usize> = points
            .iter()
            .map(|&(lat, lng)| {
                *slots.entry(self.cache.key(lat, lng)).or_insert_with(|| {
                    unique.push((lat, lng));
                    unique.len() - 1
                })
            })
            .collect();

        let shared = points.len() - unique.len();
        if shared > 0 {
            log::trace!("{shared} point(s) in batch share a cache key");
            self.stats.cache_hits.fetch_add(
                u64::try_from(shared).unwrap_or(u64::MAX),
                Ordering::Relaxed,
            );
        }

        let results: Vec<Option<LocationInfo>> = futures::stream::iter(unique)
            .map(|(lat, lng)| self.reverse_lookup(lat, lng))
            .buffered(self.batch_size())
            .collect()
            .await;

        slot_of
            .into_iter()
            .map(|slot| results[slot].clone())
            .collect()
    }

    async fn with_retry<T, F, Fut, D>(&self, mut call: F, describe: D) -> Result<T, GeocodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GeocodeError>>,
        D: Fn() -> String,
    {
        EnricherStats::bump(&self.stats.service_calls);
        match call().await {
            Err(e) if e.is_transient() => {
                log::debug!(
                    "Lookup for {} failed: {e}; retrying in {:?}",
                    describe(),
                    self.config.backoff
                );
                EnricherStats::bump(&self.stats.retries);
                tokio::time::sleep(self.config.backoff).await;
                EnricherStats::bump(&self.stats.service_calls);
                call().await
            }
            other => other,
        }
    }
}
