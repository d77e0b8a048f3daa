//! Progress reporting for collection runs.
//!
//! The orchestrator emits a [`ProgressSnapshot`] at every phase transition
//! and after every query or enrichment batch. Snapshots are delivered
//! synchronously and in order; a sink decides how (or whether) to render
//! them.


use serde::{Deserialize, Serialize};

/// Pipeline phase of a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing has started yet.
    Idle,
    /// Validating the region and planning query cells.
    Planning,
    /// Fetching candidates cell by cell.
    Querying,
    /// Dropping candidates outside the region.
    Filtering,
    /// Reverse-geocoding incomplete candidates.
    Enriching,
    /// Removing duplicate addresses.
    Deduplicating,
    /// The run finished.
    Done,
    /// The run aborted.
    Failed,
}

impl Phase {
    /// `true` for [`Phase::Done`] and [`Phase::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Querying => "querying",
            Self::Filtering => "filtering",
            Self::Enriching => "enriching",
            Self::Deduplicating => "deduplicating",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// A point-in-time view of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Current phase.
    pub phase: Phase,
    /// Overall completion, 0 to 100.
    pub percent: u8,
    /// Candidates (while querying) or records (afterwards) found so far.
    pub found_count: usize,
}

/// Receives progress snapshots from a collection run.
///
/// Implementations must be `Send + Sync` so a sink can be shared with the
/// task driving the run.
pub trait ProgressSink: Send + Sync {
    /// Called once per snapshot, in emission order.
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

/// A no-op [`ProgressSink`].
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Maps `done` of `total` units onto the `start..=end` percent range.
pub(crate) fn scaled_percent(start: u8, end: u8, done: usize, total: usize) -> u8 {
    if total == 0 || done >= total {
        return end;
    }
    let span = usize::from(end.saturating_sub(start));
    let offset = span * done / total;
    start.saturating_add(u8::try_from(offset).unwrap_or(u8::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_into_range() {
        assert_eq!(scaled_percent(5, 65, 0, 10), 5);
        assert_eq!(scaled_percent(5, 65, 5, 10), 35);
        assert_eq!(scaled_percent(5, 65, 10, 10), 65);
        assert_eq!(scaled_percent(5, 65, 0, 0), 65);
    }

    #[test]
    fn terminal_phases() {
        assert!(Phase::Done.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(!Phase::Enriching.is_terminal());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let snapshot = ProgressSnapshot {
            phase: Phase::Querying,
            percent: 40,
            found_count: 12,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["phase"], "querying");
        assert_eq!(json["foundCount"], 12);
    }
}
