//! Persistent JSON tree with structural sharing.
//!
//! Containers sit behind `Arc`, so cloning a [`Node`] is a pointer bump and a
//! rebuilt ancestor chain can keep every untouched sibling by reference.
//! [`Node::ptr_eq`] is the reference-equality check change detection relies
//! on; `==` is deep equality.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type NodeMap = BTreeMap<String, Node>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Node {
    /// Null, bool, number or string.
    Scalar(Value),
    Map(Arc<NodeMap>),
    List(Arc<Vec<Node>>),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Value::Null)
    }

    pub fn empty_map() -> Self {
        Node::Map(Arc::new(NodeMap::new()))
    }

    pub fn from_map(map: NodeMap) -> Self {
        Node::Map(Arc::new(map))
    }

    pub fn from_list(items: Vec<Node>) -> Self {
        Node::List(Arc::new(items))
    }

    /// Same allocation for containers, equal value for scalars.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Map(a), Node::Map(b)) => Arc::ptr_eq(a, b),
            (Node::List(a), Node::List(b)) => Arc::ptr_eq(a, b),
            (Node::Scalar(a), Node::Scalar(b)) => a == b,
            _ => false,
        }
    }

    /// Absent-equivalent: an explicit `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Value::Null))
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Scalar(v) => v.as_u64(),
            _ => None,
        }
    }

    /// One step down: a key of a mapping or a decimal index into a sequence.
    pub fn child(&self, segment: &str) -> Option<&Node> {
        match self {
            Node::Map(map) => map.get(segment),
            Node::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            Node::Scalar(_) => None,
        }
    }

    /// Walk `path` from this node.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Node::from_map(
                map.into_iter()
                    .map(|(k, v)| (k, Node::from(v)))
                    .collect(),
            ),
            Value::Array(items) => Node::from_list(items.into_iter().map(Node::from).collect()),
            scalar => Node::Scalar(scalar),
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        match node {
            Node::Scalar(v) => v,
            Node::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                    .collect::<Map<String, Value>>(),
            ),
            Node::List(items) => Value::Array(items.iter().cloned().map(Value::from).collect()),
        }
    }
}
