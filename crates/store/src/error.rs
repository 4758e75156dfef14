//! Store error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read or write a backing file
    #[error("store file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Backing file holds invalid JSON
    #[error("store file '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
