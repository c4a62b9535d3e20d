//! Background worker driving periodic aggregation cycles.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use super::Aggregator;

/// Shortest accepted flush interval.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Name of the worker thread.
pub const WORKER_THREAD_NAME: &str = "kmp-profiler-flush";

/// Interruptible sleep shared between the worker and its owner.
#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    fn trigger(&self) {
        *self.stopped.lock() = true;
        self.cvar.notify_all();
    }

    /// Sleep for `timeout` or until triggered. Returns `true` if triggered.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Background thread that runs an [`Aggregator`] cycle every interval.
#[derive(Debug)]
pub struct FlushWorker {
    stop: Arc<StopSignal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl FlushWorker {
    /// Start the worker.
    ///
    /// The first cycle runs one full `interval` after start. When
    /// `flush_on_shutdown` is set, one final cycle runs after [`stop`](Self::stop)
    /// is requested and before the thread exits.
    pub fn start(
        aggregator: Aggregator,
        interval: Duration,
        flush_on_shutdown: bool,
    ) -> io::Result<Self> {
        let stop = Arc::new(StopSignal::default());
        let stop_clone = stop.clone();
        let interval = interval.max(MIN_FLUSH_INTERVAL);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                Self::worker_loop(aggregator, interval, flush_on_shutdown, &stop_clone);
            })?;

        Ok(Self {
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop the worker and wait for it to finish.
    ///
    /// Waits for an in-progress cycle and, if configured, the final cycle.
    /// Calling it again is a no-op.
    pub fn stop(&self) {
        self.stop.trigger();
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("Histogram flush worker panicked");
            }
        }
    }

    /// Check if the worker thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// The main worker loop.
    fn worker_loop(
        mut aggregator: Aggregator,
        interval: Duration,
        flush_on_shutdown: bool,
        stop: &StopSignal,
    ) {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Histogram flush worker started"
        );

        let mut cycles = 0u64;
        while !stop.wait(interval) {
            aggregator.run_cycle();
            cycles += 1;
        }

        if flush_on_shutdown {
            debug!("Running final histogram cycle");
            aggregator.run_cycle();
            cycles += 1;
        }

        info!(cycles, "Histogram flush worker stopped");
    }
}

impl Drop for FlushWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
