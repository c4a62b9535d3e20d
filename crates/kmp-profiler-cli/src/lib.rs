//! Replay driver for the KMP server profiler.
//!
//! Reads `<category> <start_ms> <end_ms>` timing events and feeds them to a
//! [`ServerProfiler`](kmp_profiler::ServerProfiler), producing the same
//! histogram tree the game server writes.

pub mod config;
pub mod error;
pub mod replay;

pub use config::{Args, ReplayConfig};
pub use error::{Error, ParseError};
pub use replay::{parse_event, replay, run, ReplayStats, TimingEvent};
