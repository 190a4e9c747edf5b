//! Error types for curator-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{EntityId, ScopeId};

/// All errors that can arise from the on-disk store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, annotated with the path being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error (config write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Parse error on load: includes the file path and serde's line context.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Config file exists but is not valid YAML for [`crate::CuratorConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.curator/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The scope file did not exist at the expected path.
    #[error("scope not found at {path}")]
    ScopeNotFound { path: PathBuf },

    /// No scope contains an entity with this id.
    #[error("entity '{id}' not found in any scope")]
    EntityNotFound { id: EntityId },

    /// `add` named an id the scope already holds.
    #[error("entity '{id}' already exists in scope '{scope}'")]
    DuplicateEntity { scope: ScopeId, id: EntityId },

    /// A reorder request did not describe a valid permutation of the scope.
    #[error("invalid reorder for scope '{scope}': {reason}")]
    InvalidReorder { scope: ScopeId, reason: String },

    /// Scope ids name files under `scopes/`; separators and `..` are refused.
    #[error("invalid scope id '{scope}': {reason}")]
    InvalidScope { scope: String, reason: &'static str },

    /// Entity ids are only unique within a scope; a bare id matched several.
    #[error("entity '{id}' exists in more than one scope: {scopes}")]
    AmbiguousEntity { id: EntityId, scopes: String },

    /// An update tried to write a field owned by the ordering machinery.
    #[error("field '{field}' cannot be changed by update")]
    ManagedField { field: String },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Failure reported by a [`crate::Persistence`] collaborator.
///
/// Every variant is recoverable; callers decide between revert, retry and
/// pass-through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistError {
    /// The request never produced an application-level answer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The collaborator refused the request (unknown scope, unknown entity).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The collaborator reported a constraint violation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No answer arrived within the bounded wait.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

impl PersistError {
    /// The failure reason as handed to the caller.
    pub fn reason(&self) -> String {
        match self {
            PersistError::Transport(reason)
            | PersistError::Rejected(reason)
            | PersistError::Validation(reason) => reason.clone(),
            PersistError::Timeout(_) => self.to_string(),
        }
    }
}

impl From<StoreError> for PersistError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ScopeNotFound { .. } | StoreError::EntityNotFound { .. } => {
                PersistError::Rejected(err.to_string())
            }
            StoreError::InvalidReorder { .. }
            | StoreError::ManagedField { .. }
            | StoreError::DuplicateEntity { .. }
            | StoreError::InvalidScope { .. }
            | StoreError::AmbiguousEntity { .. } => {
                PersistError::Validation(err.to_string())
            }
            other => PersistError::Transport(other.to_string()),
        }
    }
}
