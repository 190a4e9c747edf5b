//! The persistence collaborator the engine reconciles against, plus the
//! file-backed implementation used by the CLI.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PersistError, StoreError};
use crate::store;
use crate::types::{EntityId, FieldSnapshot, OrderAssignment, OrderableEntity, ScopeId};

/// Remote source of truth for scopes, aggregates and the content document.
///
/// Every failure, transport or application-level, comes back as a
/// [`PersistError`]; none of them are fatal to the caller.
#[async_trait]
pub trait Persistence: Send + Sync + 'static {
    /// Full load of one scope. Always replaces, never merges.
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<OrderableEntity>, PersistError>;

    /// Bulk order update for every entity of `scope`.
    async fn reorder(
        &self,
        scope: &ScopeId,
        assignments: &[OrderAssignment],
    ) -> Result<(), PersistError>;

    /// Partial update of one aggregate; returns the updated entity.
    async fn update(
        &self,
        entity: &EntityId,
        fields: &FieldSnapshot,
    ) -> Result<Value, PersistError>;

    /// `Ok(None)` when no document has been stored yet.
    async fn load_document(&self) -> Result<Option<Value>, PersistError>;

    /// Whole-document save; partial remote patches are not supported.
    async fn save_document(&self, document: &Value) -> Result<(), PersistError>;
}

/// [`Persistence`] over the JSON files under `<home>/.curator/`.
///
/// File I/O runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileStore {
    home: PathBuf,
}

impl FileStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Rooted at the user's home directory.
    pub fn from_home_dir() -> Result<Self, StoreError> {
        Ok(Self::new(store::home()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, PersistError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let home = self.home.clone();
        tokio::task::spawn_blocking(move || op(&home))
            .await
            .map_err(|err| PersistError::Transport(format!("store task join error: {err}")))?
            .map_err(PersistError::from)
    }
}

#[async_trait]
impl Persistence for FileStore {
    async fn fetch(&self, scope: &ScopeId) -> Result<Vec<OrderableEntity>, PersistError> {
        let scope = scope.clone();
        self.blocking(move |home| store::load_scope_at(home, &scope).map(|f| f.entities))
            .await
    }

    async fn reorder(
        &self,
        scope: &ScopeId,
        assignments: &[OrderAssignment],
    ) -> Result<(), PersistError> {
        let scope = scope.clone();
        let assignments = assignments.to_vec();
        self.blocking(move |home| store::apply_reorder_at(home, &scope, &assignments))
            .await
    }

    async fn update(
        &self,
        entity: &EntityId,
        fields: &FieldSnapshot,
    ) -> Result<Value, PersistError> {
        let entity = entity.clone();
        let fields = fields.clone();
        let updated = self
            .blocking(move |home| store::update_entity_at(home, &entity, &fields))
            .await?;
        serde_json::to_value(updated).map_err(|e| PersistError::Transport(e.to_string()))
    }

    async fn load_document(&self) -> Result<Option<Value>, PersistError> {
        self.blocking(store::load_document_at).await
    }

    async fn save_document(&self, document: &Value) -> Result<(), PersistError> {
        let document = document.clone();
        self.blocking(move |home| store::save_document_at(home, &document).map(|_| ()))
            .await
    }
}
