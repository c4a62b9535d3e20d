//! Profiler configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between flush cycles in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

/// Default directory (under the root) holding one subdirectory per run.
pub const DEFAULT_HISTOGRAM_DIR: &str = "histogram";

/// Default `chrono` format of the per-run directory name.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default cap on samples waiting for the next cycle.
pub const DEFAULT_MAX_PENDING_SAMPLES: usize = 1 << 20;

/// Configuration for a [`ServerProfiler`](crate::ServerProfiler).
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Base directory the histogram tree is created under.
    pub root: PathBuf,

    /// Name of the directory under `root` holding one subdirectory per run.
    pub histogram_dir: String,

    /// `chrono` format string for the run directory, evaluated once at init.
    pub timestamp_format: String,

    /// Time between aggregation cycles.
    pub flush_interval: Duration,

    /// Run one last drain and write when shutting down.
    pub flush_on_shutdown: bool,

    /// Maximum queued samples. None means unbounded.
    pub max_pending_samples: Option<usize>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            histogram_dir: DEFAULT_HISTOGRAM_DIR.to_string(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            flush_on_shutdown: true,
            max_pending_samples: Some(DEFAULT_MAX_PENDING_SAMPLES),
        }
    }
}

impl ProfilerConfig {
    /// Create a configuration rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Set the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the histogram directory name.
    pub fn with_histogram_dir(mut self, dir: impl Into<String>) -> Self {
        self.histogram_dir = dir.into();
        self
    }

    /// Set the run directory timestamp format.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.timestamp_format = format.into();
        self
    }

    /// Set the maximum number of queued samples.
    pub fn with_max_pending_samples(mut self, max: usize) -> Self {
        self.max_pending_samples = Some(max);
        self
    }

    /// Remove the queue bound.
    pub fn unbounded(mut self) -> Self {
        self.max_pending_samples = None;
        self
    }

    /// Skip the final cycle on shutdown.
    pub fn without_final_flush(mut self) -> Self {
        self.flush_on_shutdown = false;
        self
    }

    /// Directory holding all runs: `<root>/<histogram_dir>`.
    pub fn histogram_root(&self) -> PathBuf {
        self.root.join(&self.histogram_dir)
    }

    /// Directory for a run started at the given (already formatted) timestamp.
    pub fn run_dir(&self, timestamp: &str) -> PathBuf {
        self.histogram_root().join(timestamp)
    }
}
