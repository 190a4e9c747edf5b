//! Deep-path content store.
//!
//! Holds the site-content document as a [`Node`] tree. Every edit rebuilds
//! only the ancestor chain of the touched leaf; everything else is shared
//! with the previous document, so `ptr_eq` on an untouched branch stays
//! `true` across edits.
//!
//! Sequence-valued fields (gallery images, FAQs, features) hold records with
//! a numeric `id`. [`ContentStore::append_record`] hands out ids that are
//! never reused for the lifetime of the store, and
//! [`ContentStore::remove_record`] falls back to the default sequence instead
//! of leaving a field empty.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

use curator_core::{PersistError, Persistence};

use crate::error::ContentError;
use crate::tree::{Node, NodeMap};

/// Where a loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// Stored document, backfilled from defaults.
    Stored,
    /// Nothing stored yet; the default document was used.
    Defaulted,
    /// Loading failed; the default document was substituted.
    Recovered { reason: String },
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    document: Node,
    defaults: Node,
    /// Highest record id ever seen per sequence path.
    issued_ids: HashMap<String, u64>,
    last_saved: Option<Node>,
}

impl ContentStore {
    /// Wrap an already-loaded document. Both roots must be mappings.
    pub fn new(document: Node, defaults: Node) -> Result<Self, ContentError> {
        if document.as_map().is_none() || defaults.as_map().is_none() {
            return Err(ContentError::RootNotMap);
        }
        Ok(Self {
            document,
            defaults,
            issued_ids: HashMap::new(),
            last_saved: None,
        })
    }

    /// A store whose document is the default document itself.
    pub fn from_defaults(defaults: Node) -> Result<Self, ContentError> {
        Self::new(defaults.clone(), defaults)
    }

    /// Load the document from `persistence` and backfill every section from
    /// `defaults`.
    ///
    /// A missing document or a failed load yields the full default document,
    /// so no caller ever edits a half-initialized tree. Only a `defaults`
    /// whose root is not a mapping is an error.
    pub async fn load<P: Persistence>(
        persistence: &P,
        defaults: Node,
    ) -> Result<(Self, DocumentOrigin), ContentError> {
        let (document, origin) = match persistence.load_document().await {
            Ok(Some(value)) => match Node::from(value) {
                node @ Node::Map(_) => (node, DocumentOrigin::Stored),
                _ => (
                    defaults.clone(),
                    DocumentOrigin::Recovered {
                        reason: "stored document root is not a mapping".to_string(),
                    },
                ),
            },
            Ok(None) => (defaults.clone(), DocumentOrigin::Defaulted),
            Err(err) => {
                tracing::warn!(error = %err, "content document load failed; using defaults");
                (
                    defaults.clone(),
                    DocumentOrigin::Recovered {
                        reason: err.reason(),
                    },
                )
            }
        };

        let mut store = Self::new(document, defaults)?;
        if origin == DocumentOrigin::Stored {
            // Backfilled sections count as unsaved until written back.
            store.last_saved = Some(store.document.clone());
            store.merge_all_defaults();
        }
        Ok((store, origin))
    }

    pub fn document(&self) -> &Node {
        &self.document
    }

    pub fn defaults(&self) -> &Node {
        &self.defaults
    }

    /// Whether the document changed since the last successful save (or since
    /// load, for a stored document).
    pub fn is_dirty(&self) -> bool {
        !self
            .last_saved
            .as_ref()
            .is_some_and(|saved| saved.ptr_eq(&self.document))
    }

    // -----------------------------------------------------------------------
    // set_path
    // -----------------------------------------------------------------------

    /// Set the leaf at `path` to `value`.
    ///
    /// Every segment but the last must resolve to an existing mapping (or an
    /// in-range sequence index); nothing is created on the way down. No
    /// schema check is made on `value`.
    pub fn set_path<S: AsRef<str>>(
        &mut self,
        path: &[S],
        value: impl Into<Node>,
    ) -> Result<(), ContentError> {
        let segments: Vec<&str> = path.iter().map(AsRef::as_ref).collect();
        if segments.is_empty() {
            return Err(ContentError::EmptyPath);
        }
        self.document = set_in(&self.document, &segments, 0, value.into())?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // merge_defaults
    // -----------------------------------------------------------------------

    /// Backfill `section` from `default_section`.
    ///
    /// An absent section takes the default wholesale. A present one is merged
    /// recursively: mappings key by key (live wins when present), sequences
    /// from live when non-empty. Returns whether anything changed; a second
    /// call with the same default always returns `false`.
    pub fn merge_defaults(&mut self, section: &str, default_section: &Node) -> bool {
        let Node::Map(root) = &self.document else {
            return false;
        };
        let merged = match root.get(section) {
            None => Some(default_section.clone()),
            Some(live) => merge_node(live, default_section),
        };
        let Some(merged) = merged else {
            return false;
        };

        let mut next = NodeMap::clone(root);
        next.insert(section.to_string(), merged);
        self.document = Node::from_map(next);
        tracing::debug!(section, "section backfilled from defaults");
        true
    }

    /// [`ContentStore::merge_defaults`] for every section of the default
    /// document. Returns the names of the sections that changed.
    pub fn merge_all_defaults(&mut self) -> Vec<String> {
        let Node::Map(defaults) = self.defaults.clone() else {
            return Vec::new();
        };
        defaults
            .iter()
            .filter(|(section, default_section)| self.merge_defaults(section, default_section))
            .map(|(section, _)| section.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    /// Append a record to the sequence at `path`.
    ///
    /// The new id is one past the highest id the sequence has ever held in
    /// this store (1 for a fresh empty sequence). `factory` builds the record
    /// from that id; its `id` field is overwritten with it regardless.
    pub fn append_record<S, F>(&mut self, path: &[S], factory: F) -> Result<u64, ContentError>
    where
        S: AsRef<str>,
        F: FnOnce(u64) -> Node,
    {
        let key = path_key(path);
        let items = self.sequence_at(path)?;

        let high_water = self.issued_ids.get(&key).copied().unwrap_or(0);
        let id = max_record_id(items).max(high_water) + 1;

        let Node::Map(record) = factory(id) else {
            return Err(ContentError::RecordNotMap { path: key });
        };
        let mut record = NodeMap::clone(&record);
        record.insert("id".to_string(), Node::Scalar(Value::from(id)));

        let mut next = items.to_vec();
        next.push(Node::from_map(record));
        self.set_path(path, Node::from_list(next))?;
        self.issued_ids.insert(key, id);
        Ok(id)
    }

    /// Remove the record with `id` from the sequence at `path`.
    ///
    /// If that leaves the sequence empty, the default document's sequence at
    /// the same path is put back instead. Returns whether a record was
    /// removed.
    pub fn remove_record<S: AsRef<str>>(&mut self, path: &[S], id: u64) -> Result<bool, ContentError> {
        let key = path_key(path);
        let items = self.sequence_at(path)?;
        let high_water = max_record_id(items);

        let remaining: Vec<Node> = items
            .iter()
            .filter(|item| item.child("id").and_then(Node::as_u64) != Some(id))
            .cloned()
            .collect();
        if remaining.len() == items.len() {
            return Ok(false);
        }

        let next = if remaining.is_empty() {
            self.defaults
                .get_path(path)
                .filter(|node| node.as_list().is_some())
                .cloned()
                .unwrap_or_else(|| Node::from_list(Vec::new()))
        } else {
            Node::from_list(remaining)
        };
        self.set_path(path, next)?;

        let entry = self.issued_ids.entry(key).or_insert(0);
        *entry = (*entry).max(high_water);
        Ok(true)
    }

    fn sequence_at<S: AsRef<str>>(&self, path: &[S]) -> Result<&[Node], ContentError> {
        if path.is_empty() {
            return Err(ContentError::EmptyPath);
        }
        let node = self
            .document
            .get_path(path)
            .ok_or_else(|| ContentError::MissingNode {
                path: path_key(path),
            })?;
        node.as_list().ok_or_else(|| ContentError::NotASequence {
            path: path_key(path),
        })
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Whole-document save with a bounded wait.
    ///
    /// The local document is left as is on failure; the caller decides
    /// whether to retry or discard.
    pub async fn save<P: Persistence>(
        &mut self,
        persistence: &P,
        timeout: Duration,
    ) -> Result<(), PersistError> {
        let snapshot = self.document.clone();
        let value = snapshot.to_value();
        match tokio::time::timeout(timeout, persistence.save_document(&value)).await {
            Ok(Ok(())) => {
                self.last_saved = Some(snapshot);
                Ok(())
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "content document save failed");
                Err(err)
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "content document save timed out");
                Err(PersistError::Timeout(timeout))
            }
        }
    }

    /// Drop unsaved edits, returning to the last saved document.
    pub fn discard_changes(&mut self) -> bool {
        match &self.last_saved {
            Some(saved) if !saved.ptr_eq(&self.document) => {
                self.document = saved.clone();
                true
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tree helpers
// ---------------------------------------------------------------------------

fn set_in(node: &Node, path: &[&str], depth: usize, value: Node) -> Result<Node, ContentError> {
    let segment = path[depth];
    let is_leaf = depth + 1 == path.len();
    let here = || path[..=depth].join(".");

    match node {
        Node::Map(map) => {
            let child = if is_leaf {
                value
            } else {
                let current = map
                    .get(segment)
                    .ok_or_else(|| ContentError::MissingNode { path: here() })?;
                set_in(current, path, depth + 1, value)?
            };
            let mut next = NodeMap::clone(map);
            next.insert(segment.to_string(), child);
            Ok(Node::from_map(next))
        }
        Node::List(items) => {
            let index = segment
                .parse::<usize>()
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| ContentError::MissingNode { path: here() })?;
            let child = if is_leaf {
                value
            } else {
                set_in(&items[index], path, depth + 1, value)?
            };
            let mut next = items.to_vec();
            next[index] = child;
            Ok(Node::from_list(next))
        }
        Node::Scalar(_) => Err(ContentError::NotContainer {
            path: path[..depth].join("."),
        }),
    }
}

/// `Some(merged)` when `default` fills anything in `live`, `None` when `live`
/// is already complete.
fn merge_node(live: &Node, default: &Node) -> Option<Node> {
    match (live, default) {
        (Node::Map(live_map), Node::Map(default_map)) => {
            let mut next: Option<NodeMap> = None;
            for (key, default_value) in default_map.iter() {
                let filled = match live_map.get(key) {
                    None => Some(default_value.clone()),
                    Some(live_value) if live_value.is_null() && !default_value.is_null() => {
                        Some(default_value.clone())
                    }
                    Some(live_value) => merge_node(live_value, default_value),
                };
                if let Some(filled) = filled {
                    next.get_or_insert_with(|| NodeMap::clone(live_map))
                        .insert(key.clone(), filled);
                }
            }
            next.map(Node::from_map)
        }
        (Node::List(items), Node::List(default_items))
            if items.is_empty() && !default_items.is_empty() =>
        {
            Some(default.clone())
        }
        (live, default) if live.is_null() && !default.is_null() => Some(default.clone()),
        _ => None,
    }
}

fn max_record_id(items: &[Node]) -> u64 {
    items
        .iter()
        .filter_map(|item| item.child("id").and_then(Node::as_u64))
        .max()
        .unwrap_or(0)
}

fn path_key<S: AsRef<str>>(path: &[S]) -> String {
    path.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(".")
}

/// Split a dotted CLI path (`faq.faqs.0.question`) into segments.
pub fn parse_path(dotted: &str) -> Vec<String> {
    dotted
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store(doc: Value, defaults: Value) -> ContentStore {
        ContentStore::new(Node::from(doc), Node::from(defaults)).expect("store")
    }

    #[test]
    fn set_path_shares_untouched_siblings() {
        let mut s = store(
            json!({"a": {"b": 1, "c": {"deep": true}}, "z": {"keep": [1, 2]}}),
            json!({}),
        );
        let before = s.document().clone();

        s.set_path(&["a", "b"], Node::from(json!(2))).expect("set");

        let after = s.document();
        assert!(!after.ptr_eq(&before), "root is rebuilt");
        assert!(!after.child("a").unwrap().ptr_eq(before.child("a").unwrap()));
        assert!(after.child("z").unwrap().ptr_eq(before.child("z").unwrap()));
        assert!(after
            .get_path(&["a", "c"])
            .unwrap()
            .ptr_eq(before.get_path(&["a", "c"]).unwrap()));
        assert_eq!(after.get_path(&["a", "b"]).and_then(Node::as_u64), Some(2));
        // The old document is untouched.
        assert_eq!(before.get_path(&["a", "b"]).and_then(Node::as_u64), Some(1));
    }

    #[test]
    fn set_path_never_creates_intermediate_nodes() {
        let mut s = store(json!({"hero": {}}), json!({}));
        let err = s
            .set_path(&["hero", "cta", "text"], Node::from(json!("Go")))
            .unwrap_err();
        assert_eq!(err, ContentError::MissingNode { path: "hero.cta".into() });

        let empty: [&str; 0] = [];
        let err = s.set_path(&empty, Node::null()).unwrap_err();
        assert_eq!(err, ContentError::EmptyPath);
    }

    #[test]
    fn set_path_can_add_a_leaf_key() {
        let mut s = store(json!({"hero": {}}), json!({}));
        s.set_path(&["hero", "title"], Node::from(json!("New"))).expect("set");
        assert_eq!(s.document().to_value(), json!({"hero": {"title": "New"}}));
    }

    #[test]
    fn set_path_through_sequence_index() {
        let mut s = store(json!({"faq": {"faqs": [{"id": 1, "q": "old"}]}}), json!({}));
        s.set_path(&["faq", "faqs", "0", "q"], Node::from(json!("new"))).expect("set");
        assert_eq!(s.document().get_path(&["faq", "faqs", "0", "q"]).unwrap().to_value(), json!("new"));

        let err = s.set_path(&["faq", "faqs", "3", "q"], Node::null()).unwrap_err();
        assert!(matches!(err, ContentError::MissingNode { .. }));
    }

    #[test]
    fn set_path_into_scalar_is_rejected() {
        let mut s = store(json!({"hero": {"title": "x"}}), json!({}));
        let err = s.set_path(&["hero", "title", "len"], Node::null()).unwrap_err();
        assert_eq!(err, ContentError::NotContainer { path: "hero.title".into() });
    }

    #[test]
    fn merge_fills_missing_and_keeps_customized() {
        let mut s = store(
            json!({"hero": {"title": "Mine", "cta": {"text": null}}}),
            json!({}),
        );
        let default_hero = Node::from(json!({
            "title": "Default", "subtitle": "Sub", "cta": {"text": "Go", "href": "/"}
        }));

        assert!(s.merge_defaults("hero", &default_hero));
        assert_eq!(
            s.document().child("hero").unwrap().to_value(),
            json!({"title": "Mine", "subtitle": "Sub", "cta": {"text": "Go", "href": "/"}})
        );
        assert!(!s.merge_defaults("hero", &default_hero), "second merge is a no-op");
    }

    #[test]
    fn complete_section_keeps_identity() {
        let mut s = store(json!({"hero": {"title": "Mine"}, "faq": {"faqs": [{"id": 4}]}}), json!({}));
        let before = s.document().clone();
        assert!(!s.merge_defaults("faq", &Node::from(json!({"faqs": [{"id": 1}]}))));
        assert!(s.document().ptr_eq(&before));
    }

    #[test]
    fn append_uses_high_water_mark() {
        let mut s = store(json!({"g": {"images": [{"id": 2}, {"id": 5}, {"id": 3}]}}), json!({}));
        let id = s
            .append_record(&["g", "images"], |_| Node::from(json!({"url": "a.png"})))
            .expect("append");
        assert_eq!(id, 6);

        assert!(s.remove_record(&["g", "images"], 6).expect("remove"));
        let id = s
            .append_record(&["g", "images"], |_| Node::from(json!({"url": "b.png"})))
            .expect("append");
        assert_eq!(id, 7, "removed ids are never handed out again");
    }

    #[test]
    fn append_rejects_non_map_record_and_non_sequence() {
        let mut s = store(json!({"g": {"images": [], "title": "x"}}), json!({}));
        let err = s.append_record(&["g", "images"], |_| Node::from(json!(3))).unwrap_err();
        assert!(matches!(err, ContentError::RecordNotMap { .. }));
        let err = s.append_record(&["g", "title"], |_| Node::empty_map()).unwrap_err();
        assert!(matches!(err, ContentError::NotASequence { .. }));
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut s = store(json!({"g": {"images": [{"id": 1}]}}), json!({}));
        let before = s.document().clone();
        assert!(!s.remove_record(&["g", "images"], 42).expect("remove"));
        assert!(s.document().ptr_eq(&before));
    }

    #[test]
    fn dirty_tracking_follows_edits_and_discard() {
        let mut s = store(json!({"hero": {"title": "A"}}), json!({}));
        assert!(s.is_dirty(), "never saved");
        s.last_saved = Some(s.document.clone());
        assert!(!s.is_dirty());

        s.set_path(&["hero", "title"], Node::from(json!("B"))).expect("set");
        assert!(s.is_dirty());
        assert!(s.discard_changes());
        assert_eq!(s.document().get_path(&["hero", "title"]).unwrap().to_value(), json!("A"));
        assert!(!s.is_dirty());
    }

    #[test]
    fn parse_path_splits_dots() {
        assert_eq!(parse_path("faq.faqs.0.question"), ["faq", "faqs", "0", "question"]);
        assert!(parse_path("").is_empty());
    }
}
