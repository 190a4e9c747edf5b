//! File-backed scope and content storage.
//!
//! # Storage layout
//!
//! ```text
//! ~/.curator/
//!   config.yaml             (optional: see `config`)
//!   content.json            (site-content document)
//!   scopes/
//!     <scope>.json          (one file per parent scope: mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function takes an explicit `home: &Path` (`fn_at`) so tests can use a
//! `TempDir`; [`home`] resolves the real home directory for the CLI.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{io_err, StoreError};
use crate::types::{
    EntityId, FieldSnapshot, OrderAssignment, OrderableEntity, ScopeFile, ScopeId, MANAGED_FIELDS,
};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.curator/`
pub fn curator_root(home: &Path) -> PathBuf {
    home.join(".curator")
}

/// `<home>/.curator/scopes/`
pub fn scopes_dir(home: &Path) -> PathBuf {
    curator_root(home).join("scopes")
}

/// `<home>/.curator/scopes/<scope>.json`: pure, no I/O.
pub fn scope_path_at(home: &Path, scope: &ScopeId) -> PathBuf {
    scopes_dir(home).join(format!("{}.json", scope.0))
}

/// Refuse scope ids that would escape `scopes/` or name no file.
pub fn validate_scope(scope: &ScopeId) -> Result<(), StoreError> {
    let reason = if scope.0.is_empty() {
        "must not be empty"
    } else if scope.0.contains(['/', '\\']) {
        "must not contain path separators"
    } else if scope.0.contains("..") {
        "must not contain '..'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidScope {
        scope: scope.0.clone(),
        reason,
    })
}

/// `<home>/.curator/content.json`: pure, no I/O.
pub fn content_path_at(home: &Path) -> PathBuf {
    curator_root(home).join("content.json")
}

/// Lists every scope that has a file under `<home>/.curator/scopes/`, sorted.
pub fn list_scopes_at(home: &Path) -> Result<Vec<ScopeId>, StoreError> {
    let dir = scopes_dir(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut scopes: Vec<ScopeId> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_suffix(".json").map(ScopeId::from)
        })
        .collect();
    scopes.sort();
    Ok(scopes)
}

// ---------------------------------------------------------------------------
// 2. Scopes
// ---------------------------------------------------------------------------

/// Load one scope. Entities come back sorted by `order`.
///
/// Returns `StoreError::ScopeNotFound` if absent,
/// `StoreError::Parse` (with path + line context) if malformed JSON.
pub fn load_scope_at(home: &Path, scope: &ScopeId) -> Result<ScopeFile, StoreError> {
    validate_scope(scope)?;
    let path = scope_path_at(home, scope);
    if !path.exists() {
        return Err(StoreError::ScopeNotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let mut file: ScopeFile =
        serde_json::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })?;
    file.entities.sort_by_key(|e| e.order);
    Ok(file)
}

/// Atomically save a scope.
///
/// Write flow: serialize → `.json.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_scope_at(home: &Path, file: &ScopeFile) -> Result<(), StoreError> {
    validate_scope(&file.scope)?;
    let path = scope_path_at(home, &file.scope);
    let json = serde_json::to_string_pretty(file)?;
    write_atomic(&path, json.as_bytes())
}

/// Append an entity at the end of `scope`, creating the scope file when
/// needed. Returns the stored entity with its assigned `order`.
pub fn add_entity_at(
    home: &Path,
    scope: &ScopeId,
    id: EntityId,
    fields: FieldSnapshot,
) -> Result<OrderableEntity, StoreError> {
    let mut file = match load_scope_at(home, scope) {
        Ok(file) => file,
        Err(StoreError::ScopeNotFound { .. }) => ScopeFile::empty(scope.clone()),
        Err(err) => return Err(err),
    };
    if file.entities.iter().any(|e| e.id == id) {
        return Err(StoreError::DuplicateEntity {
            scope: scope.clone(),
            id,
        });
    }
    reject_managed_fields(&fields)?;

    let entity = OrderableEntity {
        id,
        parent_id: scope.clone(),
        order: file.entities.len() as u32 + 1,
        fields,
    };
    file.entities.push(entity.clone());
    file.updated_at = Utc::now();
    save_scope_at(home, &file)?;
    Ok(entity)
}

/// Apply a bulk order update to a scope.
///
/// The assignment must name every entity of the scope exactly once and the
/// orders must be exactly `1..=N`; anything else is rejected untouched.
pub fn apply_reorder_at(
    home: &Path,
    scope: &ScopeId,
    assignments: &[OrderAssignment],
) -> Result<(), StoreError> {
    let mut file = load_scope_at(home, scope)?;
    validate_assignments(scope, &file.entities, assignments)?;

    for entity in &mut file.entities {
        if let Some(a) = assignments.iter().find(|a| a.entity_id == entity.id) {
            entity.order = a.order;
        }
    }
    file.entities.sort_by_key(|e| e.order);
    file.updated_at = Utc::now();
    save_scope_at(home, &file)?;
    tracing::debug!(scope = %scope, count = assignments.len(), "reorder applied");
    Ok(())
}

fn validate_assignments(
    scope: &ScopeId,
    entities: &[OrderableEntity],
    assignments: &[OrderAssignment],
) -> Result<(), StoreError> {
    let invalid = |reason: String| StoreError::InvalidReorder {
        scope: scope.clone(),
        reason,
    };

    if assignments.len() != entities.len() {
        return Err(invalid(format!(
            "expected {} assignments, got {}",
            entities.len(),
            assignments.len()
        )));
    }

    let known: HashSet<&EntityId> = entities.iter().map(|e| &e.id).collect();
    let mut seen_ids = HashSet::new();
    let mut seen_orders = HashSet::new();
    for a in assignments {
        if !known.contains(&a.entity_id) {
            return Err(invalid(format!("entity '{}' is not in this scope", a.entity_id)));
        }
        if !seen_ids.insert(&a.entity_id) {
            return Err(invalid(format!("entity '{}' assigned twice", a.entity_id)));
        }
        if a.order == 0 || a.order as usize > entities.len() || !seen_orders.insert(a.order) {
            return Err(invalid(format!(
                "order {} is not a free slot in 1..={}",
                a.order,
                entities.len()
            )));
        }
    }
    Ok(())
}

/// Merge `fields` into the entity with `id`, wherever it lives.
///
/// Managed fields (`id`, `parentId`, `order`) are refused; `updatedAt` is
/// stamped on every successful update.
pub fn update_entity_at(
    home: &Path,
    id: &EntityId,
    fields: &FieldSnapshot,
) -> Result<OrderableEntity, StoreError> {
    reject_managed_fields(fields)?;

    let (mut file, index) = locate_entity(home, id)?;
    let entity = &mut file.entities[index];
    for (key, value) in fields {
        entity.fields.insert(key.clone(), value.clone());
    }
    let now = Utc::now();
    entity
        .fields
        .insert("updatedAt".to_string(), Value::String(now.to_rfc3339()));
    let updated = entity.clone();
    file.updated_at = now;
    save_scope_at(home, &file)?;
    Ok(updated)
}

/// Find the entity with `id` in whichever scope holds it.
pub fn find_entity_at(home: &Path, id: &EntityId) -> Result<OrderableEntity, StoreError> {
    let (mut file, index) = locate_entity(home, id)?;
    Ok(file.entities.swap_remove(index))
}

/// The scope file holding `id` and the entity's index in it. An id found in
/// more than one scope is an error rather than a guess.
fn locate_entity(home: &Path, id: &EntityId) -> Result<(ScopeFile, usize), StoreError> {
    let mut found: Vec<(ScopeFile, usize)> = Vec::new();
    for scope in list_scopes_at(home)? {
        let file = load_scope_at(home, &scope)?;
        if let Some(index) = file.entities.iter().position(|e| &e.id == id) {
            found.push((file, index));
        }
    }
    match found.len() {
        0 => Err(StoreError::EntityNotFound { id: id.clone() }),
        1 => Ok(found.remove(0)),
        _ => Err(StoreError::AmbiguousEntity {
            id: id.clone(),
            scopes: found
                .iter()
                .map(|(file, _)| file.scope.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn reject_managed_fields(fields: &FieldSnapshot) -> Result<(), StoreError> {
    match MANAGED_FIELDS.iter().find(|f| fields.contains_key(**f)) {
        Some(field) => Err(StoreError::ManagedField {
            field: (*field).to_string(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// 3. Content document
// ---------------------------------------------------------------------------

/// Outcome of a document save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Content changed (or the file did not exist) and was written.
    Written { path: PathBuf },
    /// Serialized content hashes identical to what is on disk; nothing written.
    Unchanged { path: PathBuf },
}

/// Load the content document. `Ok(None)` when it has never been saved.
pub fn load_document_at(home: &Path) -> Result<Option<Value>, StoreError> {
    let path = content_path_at(home);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| StoreError::Parse { path, source: e })
}

/// Save the whole content document, skipping the write when the SHA-256 of
/// the serialized form matches the file already on disk.
pub fn save_document_at(home: &Path, document: &Value) -> Result<WriteResult, StoreError> {
    let path = content_path_at(home);
    let json = serde_json::to_string_pretty(document)?;

    if path.exists() {
        let existing = std::fs::read(&path).map_err(|e| io_err(&path, e))?;
        if digest(&existing) == digest(json.as_bytes()) {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged { path });
        }
    }

    write_atomic(&path, json.as_bytes())?;
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written { path })
}

fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Resolve the real home directory.
pub fn home() -> Result<PathBuf, StoreError> {
    dirs::home_dir().ok_or(StoreError::HomeNotFound)
}

/// `.tmp` sibling → `chmod 0600` → rename. The `.tmp` is always in the same
/// directory as the target so the rename never crosses filesystems.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("path has no parent")));
    };
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }

    let tmp = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|e| e.to_str()).unwrap_or("dat")
    ));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
