//! CLI error types.

use thiserror::Error;

/// Errors that abort a replay.
#[derive(Debug, Error)]
pub enum Error {
    /// Profiler lifecycle error.
    #[error("profiler error: {0}")]
    Profiler(#[from] kmp_profiler::ProfilerError),

    /// IO error reading the event stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task failure.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A line of the event stream that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    /// What was wrong with it.
    pub message: String,
}
