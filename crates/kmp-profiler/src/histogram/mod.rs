//! In-memory latency histograms and their on-disk form.
//!
//! # File format
//!
//! One file per category, one line per populated bucket, ascending:
//!
//! ```text
//! 0 1184
//! 1 97
//! 4 2
//! 250 1
//! ```

mod persist;
mod store;

pub use persist::{PersistOutcome, Persister, HISTOGRAM_FILE_EXTENSION};
pub use store::{Histogram, HistogramStore};
