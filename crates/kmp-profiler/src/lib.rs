//! KMP Profiler - per-message latency histograms for the game server.
//!
//! Request handlers report how long each message took to process. The
//! profiler buckets those durations per message type at millisecond
//! resolution and keeps one text file per message type up to date on disk,
//! without ever blocking or failing the reporting thread.
//!
//! # Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use kmp_profiler::{new_shared_profiler, NamedCategories, ProfilerConfig};
//!
//! let names = NamedCategories::new()
//!     .with_name(0, "HANDSHAKE")
//!     .with_name(1, "CHAT_SEND");
//! let profiler = new_shared_profiler(
//!     ProfilerConfig::new("/srv/kmp").with_flush_interval(Duration::from_secs(5)),
//!     names,
//! );
//!
//! let run_dir = profiler.init()?;
//!
//! // On the request path, from any thread:
//! profiler.record(1, 1_000.0, 1_003.2);
//!
//! // Files under `run_dir` are rewritten every flush interval.
//! profiler.shutdown();
//! # let _ = run_dir;
//! # Ok::<(), kmp_profiler::ProfilerError>(())
//! ```

pub mod aggregation;
pub mod config;
pub mod error;
pub mod histogram;
pub mod ingest;
pub mod names;
mod profiler;

/// Message-type identifier a latency is reported against.
pub type Category = u32;

pub use aggregation::CycleReport;
pub use config::ProfilerConfig;
pub use error::{PersistError, ProfilerError};
pub use histogram::{Histogram, HistogramStore};
pub use ingest::{Sample, SampleQueue};
pub use names::{CategoryNames, NamedCategories, NumericNames};
pub use profiler::{new_shared_profiler, ProfilerState, ServerProfiler, SharedProfiler, Timing};
