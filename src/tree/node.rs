//! Project tree node and the node type registry.

use crate::error::RegistryError;
use crate::registry::{Factory, TypeRegistry};
use crate::types::{AttributeValue, Attributes, NodeId};
use std::sync::Arc;

/// Registry of data-model node types.
pub type NodeRegistry = TypeRegistry<Node>;

/// A typed, named element of the project tree.
///
/// A node owns its children exclusively. Once a node is part of a
/// [`ProjectTree`](super::ProjectTree) it can only be changed through the tree,
/// which is what lets every mutation produce a change record.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) type_id: String,
    pub(crate) name: String,
    pub(crate) attributes: Attributes,
    pub(crate) children: Vec<Node>,
}

impl Node {
    /// Create a detached node with a fresh id.
    ///
    /// Prefer [`NodeRegistry::create_node`] so the type is checked against the
    /// registry; this constructor is what node factories build on.
    pub fn new(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            type_id: type_id.into(),
            name: name.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, id: NodeId) -> Option<&Node> {
        self.children.iter().find(|c| c.id == id)
    }

    pub fn child_named(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Set an attribute on a node that is not yet part of a tree.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Append a child to a node that is not yet part of a tree.
    pub fn push_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Name and key of the first NaN or infinite attribute in this subtree.
    pub fn first_non_finite(&self) -> Option<(&str, &str)> {
        self.attributes
            .iter()
            .find(|(_, value)| !value.is_finite())
            .map(|(key, _)| (self.name.as_str(), key.as_str()))
            .or_else(|| self.children.iter().find_map(Node::first_non_finite))
    }

    /// Ids of every node in this subtree, pre-order.
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.subtree_len());
        collect_ids(self, &mut ids);
        ids
    }
}

fn collect_ids(node: &Node, out: &mut Vec<NodeId>) {
    out.push(node.id);
    for child in &node.children {
        collect_ids(child, out);
    }
}

/// Factory producing nodes preloaded with `defaults`.
///
/// The type id and name of the produced template are stamped by
/// [`NodeRegistry::create_node`].
pub fn node_factory(defaults: Attributes) -> Factory<Node> {
    Arc::new(move || {
        let mut node = Node::new(String::new(), String::new());
        node.attributes = defaults.clone();
        node
    })
}

impl TypeRegistry<Node> {
    /// Construct a fresh node of `type_id` named `name`.
    pub fn create_node(&self, type_id: &str, name: impl Into<String>) -> Result<Node, RegistryError> {
        let mut node = self.create(type_id)?;
        node.id = NodeId::new();
        node.type_id = type_id.to_string();
        node.name = name.into();
        Ok(node)
    }
}
