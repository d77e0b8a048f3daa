//! The collection pipeline.
//!
//! A run walks `Planning → Querying → Filtering → Enriching →
//! Deduplicating → Done`. Any error moves it to `Failed` instead. All
//! per-run state (geocode cache, dedup seen-set, counters) lives in a
//! private run context created fresh for every [`CollectionOrchestrator::run`].

use std::sync::Arc;

use area_addresses_address_models::{AddressRecord, LocationInfo, RawCandidate};
use area_addresses_dedup::Deduplicator;
use area_addresses_geocoder::ReverseGeocodeService;
use area_addresses_geocoder::address::components_from_osm_tags;
use area_addresses_geocoder::cache::GeocodeCache;
use area_addresses_geocoder::enricher::GeocodeEnricher;
use area_addresses_geometry::{contains_point, validate_region};
use area_addresses_geometry_models::{BoundingBox, Cell, Region};
use area_addresses_grid::plan_cells;
use area_addresses_overpass::SpatialQueryService;
use area_addresses_overpass::gateway::{FetchOutcome, QueryGateway};
use futures::StreamExt;
use serde::Serialize;

use crate::progress::{Phase, ProgressSink, ProgressSnapshot, scaled_percent};
use crate::{CancelToken, CollectConfig, CollectError};

const QUERY_START: u8 = 5;
const QUERY_END: u8 = 60;
const FILTER_PERCENT: u8 = 65;
const ENRICH_START: u8 = 70;
const ENRICH_END: u8 = 95;
const DEDUP_PERCENT: u8 = 97;

/// Counters describing how complete a run was.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    /// Query cells planned (1 for a single-query region).
    pub cells_planned: usize,
    /// Cells actually queried.
    pub cells_queried: usize,
    /// Queried cells whose request failed after its retry.
    pub cells_failed: usize,
    /// Cells never queried because the candidate cap was reached.
    pub cells_skipped: usize,
    /// Raw candidates returned by the spatial service.
    pub candidates_found: usize,
    /// Candidates outside the region.
    pub filtered_out: usize,
    /// Candidates dropped as duplicates of an accepted address.
    pub duplicates: usize,
    /// Reverse lookups that produced nothing.
    pub enrichment_failed: usize,
    /// Candidates dropped because no address line could be derived.
    pub dropped_no_address: usize,
    /// Records emitted.
    pub accepted: usize,
    /// `true` if the candidate cap cut the run short.
    pub truncated: bool,
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResult {
    /// Accepted, deduplicated records.
    pub records: Vec<AddressRecord>,
    /// Run counters.
    pub summary: CollectionSummary,
}

/// Drives collection runs against a spatial service and a geocoder.
pub struct CollectionOrchestrator {
    gateway: QueryGateway,
    geocoder: Arc<dyn ReverseGeocodeService>,
    config: CollectConfig,
    retained_cache: Option<Arc<GeocodeCache>>,
}

impl CollectionOrchestrator {
    /// Creates an orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Config`] if `config` fails validation.
    pub fn new(
        spatial: Arc<dyn SpatialQueryService>,
        geocoder: Arc<dyn ReverseGeocodeService>,
        config: CollectConfig,
    ) -> Result<Self, CollectError> {
        config.validate()?;

        let gateway = QueryGateway::new(spatial, config.feature_filter, config.query_backoff());
        let retained_cache = config
            .retain_geocode_cache
            .then(|| Arc::new(GeocodeCache::new(config.cache_precision)));

        Ok(Self {
            gateway,
            geocoder,
            config,
            retained_cache,
        })
    }

    /// The configuration this orchestrator runs with.
    #[must_use]
    pub const fn config(&self) -> &CollectConfig {
        &self.config
    }

    /// Collects the addresses inside `region`.
    ///
    /// `progress` receives a snapshot at every phase transition and after
    /// every batch, ending with [`Phase::Done`] or [`Phase::Failed`].
    ///
    /// # Errors
    ///
    /// * [`CollectError::InvalidRegion`] if the region is malformed
    /// * [`CollectError::Grid`] if cell planning fails
    /// * [`CollectError::Cancelled`] if `cancel` fires before the run ends
    /// * [`CollectError::Timeout`] if the configured run deadline passes
    pub async fn run(
        &self,
        region: Region,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<CollectionResult, CollectError> {
        log::info!("Collecting addresses in {} region", region.kind());

        let mut run = RunContext::new(self, &region, progress, cancel);

        let outcome = match self.config.run_timeout() {
            Some(deadline) => tokio::time::timeout(deadline, run.execute())
                .await
                .unwrap_or_else(|_| {
                    Err(CollectError::Timeout {
                        secs: deadline.as_secs(),
                    })
                }),
            None => run.execute().await,
        };

        match &outcome {
            Ok(result) => {
                let s = &result.summary;
                log::info!(
                    "Collected {} address(es): {} cell(s) queried ({} failed, {} skipped), \
                     {} candidate(s), {} outside region, {} duplicate(s), \
                     {} enrichment miss(es), {} without address",
                    s.accepted,
                    s.cells_queried,
                    s.cells_failed,
                    s.cells_skipped,
                    s.candidates_found,
                    s.filtered_out,
                    s.duplicates,
                    s.enrichment_failed,
                    s.dropped_no_address
                );
            }
            Err(e) => {
                log::warn!("Collection failed during {}: {e}", run.phase);
                run.emit(Phase::Failed, run.percent, run.found);
            }
        }

        outcome
    }
}

/// A candidate that survived filtering.
struct Pending {
    lat: f64,
    lng: f64,
    info: LocationInfo,
    /// Already registered with the deduplicator.
    accepted: bool,
}

struct RunContext<'a> {
    orchestrator: &'a CollectionOrchestrator,
    region: &'a Region,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancelToken,
    dedup: Deduplicator,
    enricher: GeocodeEnricher,
    summary: CollectionSummary,
    phase: Phase,
    percent: u8,
    found: usize,
}

impl<'a> RunContext<'a> {
    fn new(
        orchestrator: &'a CollectionOrchestrator,
        region: &'a Region,
        progress: &'a dyn ProgressSink,
        cancel: &'a CancelToken,
    ) -> Self {
        let config = &orchestrator.config;
        let cache = orchestrator
            .retained_cache
            .clone()
            .unwrap_or_else(|| Arc::new(GeocodeCache::new(config.cache_precision)));

        Self {
            orchestrator,
            region,
            progress,
            cancel,
            dedup: Deduplicator::new(config.dedup_epsilon),
            enricher: GeocodeEnricher::new(
                orchestrator.geocoder.clone(),
                cache,
                config.enricher_config(),
            ),
            summary: CollectionSummary::default(),
            phase: Phase::Idle,
            percent: 0,
            found: 0,
        }
    }

    async fn execute(&mut self) -> Result<CollectionResult, CollectError> {
        self.check_cancelled()?;
        self.emit(Phase::Planning, 0, 0);

        let queries = self.plan()?;
        let candidates = self.query(&queries).await?;
        let pending = self.filter(candidates);
        let pending = self.enrich(pending).await?;
        let records = self.deduplicate(pending);

        self.summary.accepted = records.len();
        self.emit(Phase::Done, 100, records.len());

        Ok(CollectionResult {
            records,
            summary: self.summary,
        })
    }

    fn emit(&mut self, phase: Phase, percent: u8, found_count: usize) {
        if phase != self.phase {
            log::debug!("Collection phase {} -> {phase}", self.phase);
            self.phase = phase;
        }
        self.percent = percent;
        self.found = found_count;

        self.progress.on_progress(&ProgressSnapshot {
            phase,
            percent,
            found_count,
        });
    }

    fn check_cancelled(&self) -> Result<(), CollectError> {
        if self.cancel.is_cancelled() {
            Err(CollectError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Small regions are fetched with one query over their bounding box;
    /// everything else goes through the grid planner.
    fn plan(&mut self) -> Result<Vec<BoundingBox>, CollectError> {
        let config = &self.orchestrator.config;
        let bbox = validate_region(self.region)?;

        let queries = if bbox.lat_span() <= config.single_query_max_span
            && bbox.lng_span() <= config.single_query_max_span
        {
            log::debug!(
                "Region spans {:.5}° x {:.5}°, using a single query",
                bbox.lat_span(),
                bbox.lng_span()
            );
            vec![bbox]
        } else {
            let cells = plan_cells(self.region, &config.grid_config())?;
            log::debug!("Planned {} query cell(s)", cells.len());
            cells.iter().map(Cell::bbox).collect()
        };

        self.summary.cells_planned = queries.len();
        Ok(queries)
    }

    async fn query(&mut self, queries: &[BoundingBox]) -> Result<Vec<RawCandidate>, CollectError> {
        let orchestrator = self.orchestrator;
        let concurrency = orchestrator.config.cell_concurrency.max(1);
        let max_candidates = orchestrator.config.max_candidates;
        let total = queries.len();

        let mut candidates = Vec::new();
        let mut dispatched = 0;

        self.emit(Phase::Querying, QUERY_START, 0);

        for batch in queries.chunks(concurrency) {
            self.check_cancelled()?;
            if candidates.len() >= max_candidates {
                break;
            }

            let outcomes: Vec<FetchOutcome> = futures::stream::iter(batch)
                .map(|bbox| orchestrator.gateway.fetch_candidates(bbox))
                .buffer_unordered(concurrency)
                .collect()
                .await;

            self.check_cancelled()?;
            dispatched += batch.len();

            for outcome in outcomes {
                self.summary.cells_queried += 1;
                if outcome.is_failed() {
                    self.summary.cells_failed += 1;
                }
                candidates.extend(outcome.into_candidates());
            }

            self.emit(
                Phase::Querying,
                scaled_percent(QUERY_START, QUERY_END, dispatched, total),
                candidates.len(),
            );
        }

        self.summary.cells_skipped = total - dispatched;
        self.summary.candidates_found = candidates.len();

        if self.summary.cells_skipped > 0 || candidates.len() > max_candidates {
            log::info!(
                "Candidate cap of {max_candidates} reached; {} cell(s) skipped, {} candidate(s) dropped",
                self.summary.cells_skipped,
                candidates.len().saturating_sub(max_candidates)
            );
            candidates.truncate(max_candidates);
            self.summary.truncated = true;
        }

        Ok(candidates)
    }

    /// Drops candidates outside the region. Candidates whose own tags carry
    /// an address are checked against the deduplicator right away.
    fn filter(&mut self, candidates: Vec<RawCandidate>) -> Vec<Pending> {
        self.emit(Phase::Filtering, FILTER_PERCENT, candidates.len());

        let mut pending = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !contains_point(self.region, candidate.lat, candidate.lng) {
                self.summary.filtered_out += 1;
                continue;
            }

            let info = components_from_osm_tags(&candidate).to_location();
            let has_address = !info.address_line.is_empty();

            if has_address
                && !self
                    .dedup
                    .try_accept(&info.address_line, candidate.lat, candidate.lng)
            {
                self.summary.duplicates += 1;
                continue;
            }

            pending.push(Pending {
                lat: candidate.lat,
                lng: candidate.lng,
                info,
                accepted: has_address,
            });
        }

        pending
    }

    /// Reverse-geocodes every pending candidate with a missing field, in
    /// batches separated by the enricher's inter-batch delay. Known fields
    /// are never overwritten.
    async fn enrich(&mut self, mut pending: Vec<Pending>) -> Result<Vec<Pending>, CollectError> {
        let incomplete: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.info.is_complete())
            .map(|(i, _)| i)
            .collect();

        self.emit(Phase::Enriching, ENRICH_START, pending.len());

        let total = incomplete.len();
        let mut done = 0;

        for (n, batch) in incomplete.chunks(self.enricher.batch_size()).enumerate() {
            self.check_cancelled()?;
            if n > 0 {
                tokio::time::sleep(self.enricher.batch_delay()).await;
                self.check_cancelled()?;
            }

            let points: Vec<(f64, f64)> = batch
                .iter()
                .map(|&i| (pending[i].lat, pending[i].lng))
                .collect();
            let results = self.enricher.lookup_batch(&points).await;

            self.check_cancelled()?;

            for (&i, result) in batch.iter().zip(results) {
                match result {
                    Some(found) => pending[i].info.fill_missing(&found),
                    None => self.summary.enrichment_failed += 1,
                }
            }

            done += batch.len();
            self.emit(
                Phase::Enriching,
                scaled_percent(ENRICH_START, ENRICH_END, done, total),
                pending.len(),
            );
        }

        let stats = self.enricher.stats();
        log::debug!(
            "Enriched {total} candidate(s): {} request(s), {} cache hit(s), {} retr(ies), {} failure(s)",
            stats.service_calls,
            stats.cache_hits,
            stats.retries,
            stats.failures
        );

        Ok(pending)
    }

    fn deduplicate(&mut self, pending: Vec<Pending>) -> Vec<AddressRecord> {
        self.emit(Phase::Deduplicating, DEDUP_PERCENT, pending.len());

        let mut records = Vec::with_capacity(pending.len());

        for p in pending {
            if !p.accepted {
                if p.info.address_line.trim().is_empty() {
                    self.summary.dropped_no_address += 1;
                    continue;
                }
                if !self.dedup.try_accept(&p.info.address_line, p.lat, p.lng) {
                    self.summary.duplicates += 1;
                    continue;
                }
            }

            match AddressRecord::new(p.info, p.lat, p.lng) {
                Some(record) => records.push(record),
                None => self.summary.dropped_no_address += 1,
            }
        }

        records
    }
}
