//! Change records emitted by tree mutations.
//!
//! A change stores node ids and type-tagged documents only, never references
//! into the live tree, so history and data never own each other.

use crate::tree::NodeDocument;
use crate::types::{AttributeValue, NodeId};
use serde::{Deserialize, Serialize};

/// One before/after pair produced by a single tree mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Attribute set (`after` is `Some`) or cleared (`after` is `None`).
    Attribute {
        node: NodeId,
        key: String,
        before: Option<AttributeValue>,
        after: Option<AttributeValue>,
    },
    Renamed {
        node: NodeId,
        before: String,
        after: String,
    },
    ChildInserted {
        parent: NodeId,
        index: usize,
        subtree: NodeDocument,
    },
    ChildRemoved {
        parent: NodeId,
        index: usize,
        subtree: NodeDocument,
    },
}

impl Change {
    /// The node this change is about.
    pub fn target(&self) -> NodeId {
        match self {
            Change::Attribute { node, .. } | Change::Renamed { node, .. } => *node,
            Change::ChildInserted { subtree, .. } | Change::ChildRemoved { subtree, .. } => {
                subtree.id
            }
        }
    }

    /// The change that undoes this one.
    pub fn inverse(&self) -> Change {
        match self.clone() {
            Change::Attribute {
                node,
                key,
                before,
                after,
            } => Change::Attribute {
                node,
                key,
                before: after,
                after: before,
            },
            Change::Renamed { node, before, after } => Change::Renamed {
                node,
                before: after,
                after: before,
            },
            Change::ChildInserted {
                parent,
                index,
                subtree,
            } => Change::ChildRemoved {
                parent,
                index,
                subtree,
            },
            Change::ChildRemoved {
                parent,
                index,
                subtree,
            } => Change::ChildInserted {
                parent,
                index,
                subtree,
            },
        }
    }

    /// Whether applying this change leaves the tree as it was.
    pub fn is_noop(&self) -> bool {
        match self {
            Change::Attribute { before, after, .. } => before == after,
            Change::Renamed { before, after, .. } => before == after,
            Change::ChildInserted { .. } | Change::ChildRemoved { .. } => false,
        }
    }

    /// Short human-readable description, used in logs and error reasons.
    pub fn describe(&self) -> String {
        match self {
            Change::Attribute { node, key, after, .. } => match after {
                Some(value) => format!("set {}.{} = {}", node, key, value),
                None => format!("clear {}.{}", node, key),
            },
            Change::Renamed { node, after, .. } => format!("rename {} to '{}'", node, after),
            Change::ChildInserted { parent, subtree, .. } => {
                format!("insert {} '{}' under {}", subtree.type_id, subtree.name, parent)
            }
            Change::ChildRemoved { parent, subtree, .. } => {
                format!("remove {} '{}' from {}", subtree.type_id, subtree.name, parent)
            }
        }
    }
}
