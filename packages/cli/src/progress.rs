//! `indicatif`-backed progress bar implementation.
//!
//! Wraps [`indicatif::ProgressBar`] behind the [`ProgressSink`] trait so
//! the collection pipeline stays decoupled from the rendering backend.

use std::time::Duration;

use area_addresses_collect::{Phase, ProgressSink, ProgressSnapshot};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// An `indicatif` [`ProgressBar`] that implements [`ProgressSink`].
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    /// Creates a percentage bar attached to `multi`.
    #[must_use]
    pub fn collection_bar(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new(100));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {msg:<32} {wide_bar:.cyan/dim} {pos:>3}% [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message("starting");

        Self { bar }
    }
}

impl ProgressSink for IndicatifProgress {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.bar.set_position(u64::from(snapshot.percent));

        let message = match snapshot.phase {
            Phase::Querying => format!("querying ({} candidates)", snapshot.found_count),
            Phase::Done => format!("done ({} addresses)", snapshot.found_count),
            phase => format!("{phase} ({} found)", snapshot.found_count),
        };

        if snapshot.phase.is_terminal() {
            self.bar.finish_with_message(message);
        } else {
            self.bar.set_message(message);
        }
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set

    log::set_max_level(level);

    multi
}
