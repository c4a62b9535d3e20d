//! Sample ingestion.
//!
//! Request handlers report `(category, start, end)` timings. Each report is
//! reduced to a [`Sample`] with an integer millisecond latency and pushed to
//! the [`SampleQueue`], which is the only structure shared between the hot
//! path and the flush worker.

mod queue;

use std::time::Duration;

pub use queue::SampleQueue;

use crate::Category;

/// One `(category, latency)` observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Message type the latency belongs to.
    pub category: Category,
    /// Processing time in whole milliseconds. Negative if end < start.
    pub latency_ms: i64,
}

/// Round `end_ms - start_ms` to the nearest millisecond, ties to even.
///
/// Returns `None` when the difference is NaN or infinite. Finite values
/// outside the `i64` range saturate.
pub fn latency_ms(start_ms: f64, end_ms: f64) -> Option<i64> {
    let delta = end_ms - start_ms;
    if !delta.is_finite() {
        return None;
    }
    Some(delta.round_ties_even() as i64)
}

/// Convert a [`Duration`] to whole milliseconds, ties to even.
pub fn duration_ms(duration: Duration) -> i64 {
    const NANOS_PER_MS: u128 = 1_000_000;

    let nanos = duration.as_nanos();
    let mut ms = nanos / NANOS_PER_MS;
    let rem = nanos % NANOS_PER_MS;
    if rem > NANOS_PER_MS / 2 || (rem == NANOS_PER_MS / 2 && ms % 2 == 1) {
        ms += 1;
    }
    i64::try_from(ms).unwrap_or(i64::MAX)
}
