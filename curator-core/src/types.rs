//! Domain types shared by the ordering engine, the commit scheduler and the
//! persistence collaborators.
//!
//! Wire field names are camelCase (`parentId`, `entityId`) so the same
//! structs serialize straight into what the admin API exchanges.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Key of a parent scope, e.g. a course id whose chapters are ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub String);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque entity id, unique within its parent scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Flat set of editable field values for one aggregate (title, price, ...).
pub type FieldSnapshot = Map<String, Value>;

/// Field names owned by the ordering machinery; never part of a free-form update.
pub const MANAGED_FIELDS: [&str; 3] = ["id", "parentId", "order"];

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A record that lives at a position inside a parent scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderableEntity {
    pub id: EntityId,
    pub parent_id: ScopeId,
    /// 1-based display position; contiguous within the scope once persisted.
    pub order: u32,
    /// Everything else the entity carries (title, duration, ...), untouched
    /// by ordering.
    #[serde(flatten)]
    pub fields: FieldSnapshot,
}

impl OrderableEntity {
    pub fn new(id: impl Into<EntityId>, parent_id: impl Into<ScopeId>, order: u32) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            order,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// One `{entityId, order}` pair of a bulk reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAssignment {
    pub entity_id: EntityId,
    pub order: u32,
}

impl From<&OrderableEntity> for OrderAssignment {
    fn from(entity: &OrderableEntity) -> Self {
        Self {
            entity_id: entity.id.clone(),
            order: entity.order,
        }
    }
}

/// On-disk payload for one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeFile {
    pub scope: ScopeId,
    #[serde(default)]
    pub entities: Vec<OrderableEntity>,
    pub updated_at: DateTime<Utc>,
}

impl ScopeFile {
    pub fn empty(scope: ScopeId) -> Self {
        Self {
            scope,
            entities: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(ScopeId::from("course-1").to_string(), "course-1");
        assert_eq!(EntityId::from("ch-01").to_string(), "ch-01");
    }

    #[test]
    fn entity_uses_camel_case_and_flattens_extra_fields() {
        let entity = OrderableEntity::new("ch-1", "course-1", 2).with_field("title", "Intro");
        let value = serde_json::to_value(&entity).expect("serialize");
        assert_eq!(
            value,
            json!({"id": "ch-1", "parentId": "course-1", "order": 2, "title": "Intro"})
        );

        let back: OrderableEntity = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, entity);
    }

    #[test]
    fn assignment_wire_shape() {
        let entity = OrderableEntity::new("l-9", "ch-1", 4);
        let value = serde_json::to_value(OrderAssignment::from(&entity)).expect("serialize");
        assert_eq!(value, json!({"entityId": "l-9", "order": 4}));
    }
}
