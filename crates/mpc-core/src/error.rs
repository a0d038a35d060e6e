//! Error types for the planning core.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of a backing flight plan document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("flight plan has no file location")]
    NoFile,

    #[error("flight plan file not found: {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed flight plan {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl DocumentError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}

/// Failures when handing work to the UI context.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("UI loop has shut down")]
    Closed,

    #[error("UI job was dropped before it produced a result")]
    Dropped,
}
