//! Error types for nbstore-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the nbstore-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Unrecognized counter name or polarity
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backing store could not be opened or created
    #[error("storage unavailable at {path:?}: {reason}")]
    StorageUnavailable { path: PathBuf, reason: String },

    /// Database error during a single operation
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wrap a failure to reach the backing store at `path`.
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::StorageUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for nbstore-core
pub type Result<T> = std::result::Result<T, Error>;
