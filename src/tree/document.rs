//! Persisted project format.
//!
//! A project is stored as one nested, ordered, type-tagged JSON document:
//!
//! ```json
//! {
//!   "typeId": "Project",
//!   "id": "9b7e...",
//!   "name": "bridge",
//!   "attributes": { "units": "SI" },
//!   "children": [ ... ]
//! }
//! ```
//!
//! Loading goes through the node registry, so every `typeId` must be known.

use crate::error::TreeError;
use crate::tree::{Node, NodeRegistry};
use crate::types::{Attributes, NodeId};
use serde::{Deserialize, Serialize};

/// Serialized form of a node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    pub type_id: String,
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub children: Vec<NodeDocument>,
}

impl NodeDocument {
    pub fn from_node(node: &Node) -> Self {
        Self {
            type_id: node.type_id.clone(),
            id: node.id,
            name: node.name.clone(),
            attributes: node.attributes.clone(),
            children: node.children.iter().map(NodeDocument::from_node).collect(),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, TreeError> {
        serde_json::from_slice(bytes).map_err(|e| TreeError::corrupt("/", e.to_string()))
    }

    /// Pretty, deterministic JSON.
    ///
    /// NaN and infinite floats would be written as `null` and make the file
    /// unloadable, so they fail the write instead.
    pub fn to_json(&self) -> Result<String, TreeError> {
        if let Some((path, key)) = self.first_non_finite("") {
            return Err(TreeError::corrupt(
                path,
                format!("attribute '{}' is not a finite number", key),
            ));
        }
        serde_json::to_string_pretty(self).map_err(|e| TreeError::corrupt("/", e.to_string()))
    }

    fn first_non_finite(&self, parent_path: &str) -> Option<(String, String)> {
        let path = format!("{}/{}", parent_path, self.name);
        if let Some((key, _)) = self.attributes.iter().find(|(_, v)| !v.is_finite()) {
            return Some((path, key.clone()));
        }
        self.children
            .iter()
            .find_map(|child| child.first_non_finite(&path))
    }

    /// Rebuild the subtree, failing on the first unknown type.
    pub fn to_node(&self, registry: &NodeRegistry) -> Result<Node, TreeError> {
        self.build(registry, "", &mut None)
    }

    /// Rebuild the subtree, skipping children whose type (or any type below
    /// them) cannot be resolved.
    ///
    /// Skipped subtrees are reported in `skipped`. The document's own root
    /// must still resolve.
    pub fn to_node_lenient(
        &self,
        registry: &NodeRegistry,
        skipped: &mut Vec<TreeError>,
    ) -> Result<Node, TreeError> {
        let mut report = Some(std::mem::take(skipped));
        let result = self.build(registry, "", &mut report);
        *skipped = report.unwrap_or_default();
        result
    }

    fn build(
        &self,
        registry: &NodeRegistry,
        parent_path: &str,
        skipped: &mut Option<Vec<TreeError>>,
    ) -> Result<Node, TreeError> {
        let path = format!("{}/{}", parent_path, self.name);
        let mut node = registry
            .create_node(&self.type_id, self.name.clone())
            .map_err(|e| TreeError::corrupt(path.clone(), e.to_string()))?;
        node.id = self.id;
        node.attributes = self.attributes.clone();
        node.children = Vec::with_capacity(self.children.len());

        for child in &self.children {
            match child.build(registry, &path, skipped) {
                Ok(built) => node.children.push(built),
                Err(err) => match skipped {
                    Some(report) => {
                        tracing::warn!(error = %err, "Skipping unreadable subtree");
                        report.push(err);
                    }
                    None => return Err(err),
                },
            }
        }
        Ok(node)
    }
}
