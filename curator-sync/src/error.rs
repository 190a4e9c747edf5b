//! Error types for curator-sync.

use std::path::PathBuf;

use thiserror::Error;

use curator_core::{PersistError, StoreError};

/// Precondition failures of the deep-path content store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    /// `set_path` and friends need at least one segment.
    #[error("path must not be empty")]
    EmptyPath,

    /// An intermediate segment does not exist; containers are never created
    /// implicitly.
    #[error("no node at '{path}'")]
    MissingNode { path: String },

    /// A segment tried to descend into a scalar.
    #[error("'{path}' is not a mapping or sequence")]
    NotContainer { path: String },

    /// The node at `path` must be an ordered sequence of records.
    #[error("'{path}' is not a sequence")]
    NotASequence { path: String },

    /// Sequence records are mappings carrying an `id`.
    #[error("record for '{path}' must be a mapping")]
    RecordNotMap { path: String },

    /// A document root must be a mapping of section name to section.
    #[error("document root must be a mapping")]
    RootNotMap,
}

/// All errors that can arise from engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("defaults JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
