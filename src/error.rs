//! Error types for the resolution and retrieval engine.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial taxonomy: store, directory, cache failures

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All errors produced by the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The message store could not be opened (wrong path, permissions, locked).
    #[error("Messages database unavailable at {path:?}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Contacts access was refused by the user or the OS.
    #[error("Access to Contacts was denied")]
    PermissionDenied,

    /// The contacts authorization prompt did not answer in time.
    #[error("Contacts did not respond within {0:?}")]
    AuthorizationTimeout(Duration),

    /// The contact directory failed for a reason other than authorization.
    #[error("Contact directory error: {0}")]
    Directory(String),

    /// The persisted contact cache could not be parsed.
    #[error("Malformed contact cache at {path:?}: {source}")]
    MalformedCache {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures where the directory refused or never answered.
    ///
    /// Resolution degrades to store-only matching on these.
    pub fn is_access_refused(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::AuthorizationTimeout(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
