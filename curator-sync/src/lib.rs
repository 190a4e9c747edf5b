//! # curator-sync
//!
//! Optimistic reordering, deep-path content editing and debounced commits,
//! each reconciled against a [`curator_core::Persistence`] collaborator.
//!
//! - [`OrderedCollection`]: move entities within a scope; revert on failure
//! - [`ContentStore`]: structurally shared content tree with default backfill
//! - [`CommitScheduler`]: coalesce aggregate edits into one `update`

pub mod content;
pub mod debounce;
pub mod defaults;
pub mod diff;
pub mod error;
pub mod ordering;
pub mod tree;

pub use content::{parse_path, ContentStore, DocumentOrigin};
pub use debounce::{BlurOutcome, CommitReport, CommitScheduler};
pub use diff::document_diff;
pub use error::{ContentError, SyncError};
pub use ordering::{OrderedCollection, ReconcileOutcome, Reconciliation};
pub use tree::{Node, NodeMap};
