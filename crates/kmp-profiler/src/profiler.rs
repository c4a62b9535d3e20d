//! Profiler lifecycle and the ingestion entry point.

use std::fmt::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::aggregation::{Aggregator, FlushWorker};
use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::histogram::Persister;
use crate::ingest::{self, Sample, SampleQueue};
use crate::names::{CategoryNames, NumericNames};
use crate::Category;

/// Lifecycle state of a [`ServerProfiler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerState {
    /// Created, `init` not yet successful. `record` is a no-op.
    Uninitialized,
    /// Accepting samples and flushing periodically.
    Running,
    /// Shut down for good. `record` is a no-op.
    Stopped,
}

impl ProfilerState {
    /// Lowercase name, used in errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ProfilerState::Uninitialized => "uninitialized",
            ProfilerState::Running => "running",
            ProfilerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ProfilerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Lifecycle {
    state: ProfilerState,
    worker: Option<FlushWorker>,
    output_dir: Option<PathBuf>,
}

/// Per-message-type latency recorder.
///
/// Construct one at server startup, [`init`](Self::init) it, and hand a
/// [`SharedProfiler`] to every request path that reports timings. Recording
/// only pushes to a queue; a background thread folds samples into histograms
/// and rewrites `<root>/histogram/<start time>/<name>.txt` every flush
/// interval.
///
/// Recording never fails. Until `init` succeeds and after `shutdown` begins,
/// samples are silently ignored.
pub struct ServerProfiler {
    config: ProfilerConfig,
    names: Arc<dyn CategoryNames>,
    queue: Arc<SampleQueue>,
    lifecycle: Mutex<Lifecycle>,
    /// Held for the whole of `shutdown`, so a concurrent caller returns only
    /// after the worker has been joined.
    shutdown_lock: Mutex<()>,
}

/// Thread-safe profiler handle.
pub type SharedProfiler = Arc<ServerProfiler>;

/// Create a shared profiler. It still has to be initialized.
pub fn new_shared_profiler(
    config: ProfilerConfig,
    names: impl CategoryNames + 'static,
) -> SharedProfiler {
    Arc::new(ServerProfiler::with_names(config, names))
}

impl ServerProfiler {
    /// Create an uninitialized profiler naming files by numeric category.
    pub fn new(config: ProfilerConfig) -> Self {
        Self::with_names(config, NumericNames)
    }

    /// Create an uninitialized profiler with a category name resolver.
    pub fn with_names(config: ProfilerConfig, names: impl CategoryNames + 'static) -> Self {
        let queue = Arc::new(SampleQueue::with_max_pending(config.max_pending_samples));
        Self {
            config,
            names: Arc::new(names),
            queue,
            lifecycle: Mutex::new(Lifecycle {
                state: ProfilerState::Uninitialized,
                worker: None,
                output_dir: None,
            }),
            shutdown_lock: Mutex::new(()),
        }
    }

    /// Create the run directory and start the flush worker.
    ///
    /// Returns the run directory. On error the profiler stays
    /// uninitialized and may be retried; ancestor directories created before
    /// the failure are left in place.
    pub fn init(&self) -> Result<PathBuf> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != ProfilerState::Uninitialized {
            return Err(ProfilerError::InvalidState {
                expected: ProfilerState::Uninitialized.as_str(),
                found: lifecycle.state.as_str(),
            });
        }

        let timestamp = self.start_timestamp()?;
        let dir = self.config.run_dir(&timestamp);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ProfilerError::from_create_dir(dir.clone(), e))?;

        let persister = Persister::new(&dir, self.names.clone());
        let aggregator = Aggregator::new(self.queue.clone(), persister);
        let worker = FlushWorker::start(
            aggregator,
            self.config.flush_interval,
            self.config.flush_on_shutdown,
        )
        .map_err(ProfilerError::SpawnWorker)?;

        self.queue.open();
        lifecycle.worker = Some(worker);
        lifecycle.output_dir = Some(dir.clone());
        lifecycle.state = ProfilerState::Running;

        info!(
            output_dir = %dir.display(),
            flush_interval_ms = self.config.flush_interval.as_millis() as u64,
            "Server profiler started"
        );

        Ok(dir)
    }

    /// Stop the flush worker and wait for it to exit.
    ///
    /// After this returns no more files are written and `record` is a
    /// permanent no-op. Does nothing unless the profiler is running.
    ///
    /// The state stays `Running` until the worker has exited; introspection
    /// does not block on the join.
    pub fn shutdown(&self) {
        let _shutdown = self.shutdown_lock.lock();

        let worker = {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != ProfilerState::Running {
                debug!(state = %lifecycle.state, "Shutdown ignored, profiler not running");
                return;
            }
            // Close first: nothing can be accepted after the final drain.
            self.queue.close();
            lifecycle.worker.take()
        };

        if let Some(worker) = worker {
            worker.stop();
        }
        self.lifecycle.lock().state = ProfilerState::Stopped;

        // Without a final cycle, leftovers would otherwise live until drop.
        let mut leftover = Vec::new();
        self.queue.drain_into(&mut leftover);

        info!(
            discarded = leftover.len(),
            dropped = self.queue.dropped(),
            "Server profiler stopped"
        );
    }

    /// Record the processing time of one message.
    ///
    /// `start_ms` and `end_ms` are timestamps in milliseconds; the difference
    /// is rounded to the nearest whole millisecond (ties to even). Non-finite
    /// differences are dropped.
    pub fn record(&self, category: Category, start_ms: f64, end_ms: f64) {
        match ingest::latency_ms(start_ms, end_ms) {
            Some(latency_ms) => self.push(category, latency_ms),
            None => {
                if self.queue.is_open() {
                    self.queue.note_dropped();
                }
            }
        }
    }

    /// Record a processing time given as a [`Duration`].
    pub fn record_duration(&self, category: Category, elapsed: Duration) {
        self.push(category, ingest::duration_ms(elapsed));
    }

    /// Record the time elapsed since `start`.
    pub fn record_since(&self, category: Category, start: Instant) {
        self.record_duration(category, start.elapsed());
    }

    /// Start timing a message; the latency is recorded when the guard drops.
    pub fn time(&self, category: Category) -> Timing<'_> {
        Timing {
            profiler: self,
            category,
            start: Instant::now(),
        }
    }

    fn push(&self, category: Category, latency_ms: i64) {
        self.queue.push(Sample {
            category,
            latency_ms,
        });
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProfilerState {
        self.lifecycle.lock().state
    }

    /// Check if the profiler is accepting samples.
    pub fn is_running(&self) -> bool {
        self.state() == ProfilerState::Running
    }

    /// Run directory, once `init` has succeeded.
    pub fn output_dir(&self) -> Option<PathBuf> {
        self.lifecycle.lock().output_dir.clone()
    }

    /// Samples waiting for the next cycle.
    pub fn pending_samples(&self) -> usize {
        self.queue.len()
    }

    /// Samples rejected so far (queue full or non-finite latency).
    pub fn dropped_samples(&self) -> u64 {
        self.queue.dropped()
    }

    /// The configuration this profiler was created with.
    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    fn start_timestamp(&self) -> Result<String> {
        let mut timestamp = String::new();
        write!(
            timestamp,
            "{}",
            chrono::Local::now().format(&self.config.timestamp_format)
        )
        .map_err(|_| ProfilerError::TimestampFormat(self.config.timestamp_format.clone()))?;
        Ok(timestamp)
    }
}

impl fmt::Debug for ServerProfiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("ServerProfiler")
            .field("state", &lifecycle.state)
            .field("output_dir", &lifecycle.output_dir.as_deref().map(Path::display))
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ServerProfiler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Records the time between its creation and drop.
#[must_use = "the latency is recorded when the guard is dropped"]
#[derive(Debug)]
pub struct Timing<'a> {
    profiler: &'a ServerProfiler,
    category: Category,
    start: Instant,
}

impl Timing<'_> {
    /// Category being timed.
    pub fn category(&self) -> Category {
        self.category
    }
}

impl Drop for Timing<'_> {
    fn drop(&mut self) {
        self.profiler.record_since(self.category, self.start);
    }
}
