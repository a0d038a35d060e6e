//! Error types for mission folders and the session.

use mpc_core::{DispatchError, DocumentError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("mission folder already exists: {0}")]
    FolderExists(PathBuf),

    #[error("mission folder not found: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("mission {0} has neither settings.json nor settings.mfs")]
    MissingSettings(PathBuf),

    #[error("invalid mission name: {0:?}")]
    InvalidName(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed mission settings {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed legacy settings {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("session task aborted: {0}")]
    TaskAborted(String),
}

impl SessionError {
    /// Classify an I/O failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::AlreadyExists => Self::FolderExists(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
