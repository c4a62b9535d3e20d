//! Periodic aggregation.
//!
//! ```text
//! request handlers ──record()──▶ SampleQueue
//!                                    │  drain every flush interval
//!                                    ▼
//!                      FlushWorker ─▶ Aggregator ─▶ HistogramStore
//!                                                        │
//!                                                        ▼
//!                                          Persister ─▶ <name>.txt
//! ```

mod aggregator;
mod flush_worker;

pub use aggregator::{Aggregator, CycleReport};
pub use flush_worker::{FlushWorker, MIN_FLUSH_INTERVAL, WORKER_THREAD_NAME};
