//! Curator core library: domain types, the persistence collaborator
//! contract, file-backed storage, config and errors.
//!
//! - [`types`]: newtypes and orderable entities
//! - [`error`]: [`StoreError`], [`PersistError`]
//! - [`persistence`]: the [`Persistence`] trait and [`FileStore`]
//! - [`store`]: scope / document files under `~/.curator/`
//! - [`config`]: `~/.curator/config.yaml`

pub mod config;
pub mod error;
pub mod persistence;
pub mod store;
pub mod types;

pub use config::CuratorConfig;
pub use error::{PersistError, StoreError};
pub use persistence::{FileStore, Persistence};
pub use types::{
    EntityId, FieldSnapshot, OrderAssignment, OrderableEntity, ScopeFile, ScopeId,
};
