//! One drain → fold → persist cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::histogram::{HistogramStore, Persister};
use crate::ingest::{Sample, SampleQueue};

/// Result of one aggregation cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Samples drained from the queue and folded into the store.
    pub samples_folded: u64,

    /// Categories in the store after folding.
    pub categories: usize,

    /// Histogram files replaced.
    pub files_written: usize,

    /// Histogram files that failed to write (non-fatal).
    pub write_errors: usize,

    /// Samples rejected by the queue since the previous cycle.
    pub dropped_samples: u64,

    /// Duration of the cycle.
    pub duration: Duration,
}

impl CycleReport {
    /// Check if every category was written.
    pub fn is_clean(&self) -> bool {
        self.write_errors == 0
    }
}

/// Folds queued samples into the store and writes the result.
///
/// The aggregator is the single owner of the [`HistogramStore`]; it lives on
/// the flush worker thread and is never shared.
#[derive(Debug)]
pub struct Aggregator {
    queue: Arc<SampleQueue>,
    store: HistogramStore,
    persister: Persister,
    /// Drain buffer, swapped with the queue's buffer each cycle.
    scratch: Vec<Sample>,
    /// Queue drop counter as of the previous cycle.
    dropped_seen: u64,
}

impl Aggregator {
    /// Create an aggregator with an empty store.
    pub fn new(queue: Arc<SampleQueue>, persister: Persister) -> Self {
        Self {
            queue,
            store: HistogramStore::new(),
            persister,
            scratch: Vec::new(),
            dropped_seen: 0,
        }
    }

    /// The aggregated histograms.
    pub fn store(&self) -> &HistogramStore {
        &self.store
    }

    /// Run one cycle.
    ///
    /// Files are written even if nothing was drained, so idle categories keep
    /// an up-to-date file.
    pub fn run_cycle(&mut self) -> CycleReport {
        let start = Instant::now();

        self.queue.drain_into(&mut self.scratch);
        let samples_folded = self.store.fold_all(self.scratch.drain(..));

        let outcome = self.persister.persist(&self.store);

        let dropped_total = self.queue.dropped();
        let dropped_samples = dropped_total.saturating_sub(self.dropped_seen);
        self.dropped_seen = dropped_total;

        let report = CycleReport {
            samples_folded,
            categories: self.store.len(),
            files_written: outcome.files_written,
            write_errors: outcome.failures.len(),
            dropped_samples,
            duration: start.elapsed(),
        };

        if dropped_samples > 0 {
            warn!(
                dropped = dropped_samples,
                "Samples rejected since last cycle"
            );
        }

        if report.is_clean() {
            debug!(
                samples = report.samples_folded,
                categories = report.categories,
                files = report.files_written,
                duration_us = report.duration.as_micros() as u64,
                "Histogram cycle completed"
            );
        } else {
            warn!(
                samples = report.samples_folded,
                files = report.files_written,
                write_errors = report.write_errors,
                "Histogram cycle completed with write errors"
            );
        }

        report
    }
}
