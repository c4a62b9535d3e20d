//! Profiler error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::Category;

/// Errors returned by profiler lifecycle operations.
#[derive(Debug, Error)]
pub enum ProfilerError {
    /// The output directory (or one of its ancestors) could not be created.
    #[error("failed to create histogram directory {}: {source}", path.display())]
    CreateDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The process is not allowed to create the output directory.
    #[error("permission denied creating histogram directory {}", path.display())]
    PermissionDenied {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The run directory timestamp format is not a valid `chrono` format.
    #[error("invalid timestamp format {0:?}")]
    TimestampFormat(String),

    /// The background flush thread could not be started.
    #[error("failed to spawn flush worker: {0}")]
    SpawnWorker(#[source] io::Error),

    /// The requested transition is not valid from the current state.
    #[error("invalid profiler state: expected {expected}, found {found}")]
    InvalidState {
        /// State the operation requires.
        expected: &'static str,
        /// State the profiler is actually in.
        found: &'static str,
    },
}

impl ProfilerError {
    /// Classify a directory creation failure.
    pub(crate) fn from_create_dir(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            Self::PermissionDenied { path, source }
        } else {
            Self::CreateDirectory { path, source }
        }
    }
}

/// Failure to write one category's histogram file.
#[derive(Debug, Error)]
#[error("failed to write histogram for category {category} to {}: {source}", path.display())]
pub struct PersistError {
    /// Category whose file could not be written.
    pub category: Category,
    /// Target file.
    pub path: PathBuf,
    /// Underlying IO error.
    #[source]
    pub source: io::Error,
}

/// Result alias for profiler operations.
pub type Result<T> = std::result::Result<T, ProfilerError>;
