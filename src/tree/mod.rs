//! Project Tree
//!
//! The in-memory project data model: an ordered tree of typed, named nodes.
//! The tree keeps a child -> parent index next to the nodes so ancestor
//! queries and id lookups never scan the whole tree.
//!
//! Every structural or attribute mutation returns the [`Change`] it performed.
//! [`crate::project::Project`] feeds those changes into the command history;
//! calling the tree directly is untracked and meant for programmatic
//! construction.

pub mod change;
pub mod document;
pub mod hasher;
pub mod node;

pub use change::Change;
pub use document::NodeDocument;
pub use node::{node_factory, Node, NodeRegistry};

use crate::error::TreeError;
use crate::types::{AttributeValue, NodeId};
use std::collections::{HashMap, HashSet};

/// A project's node tree plus its parent index.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectTree {
    root: Node,
    parents: HashMap<NodeId, NodeId>,
}

impl ProjectTree {
    /// Wrap `root` as a tree. Fails if two nodes share an id.
    pub fn new(root: Node) -> Result<Self, TreeError> {
        let mut parents = HashMap::new();
        let mut seen = HashSet::new();
        index_subtree(&root, None, &mut parents, &mut seen)
            .map_err(|id| TreeError::corrupt(format!("/{}", root.name), format!("duplicate node id {}", id)))?;
        Ok(Self { root, parents })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_id(&self) -> NodeId {
        self.root.id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id == self.root.id || self.parents.contains_key(&id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        let chain = self.chain(id)?;
        let mut node = &self.root;
        for step in chain.iter().skip(1) {
            node = node.child(*step)?;
        }
        Some(node)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let chain = self.chain(id)?;
        let mut node = &mut self.root;
        for step in chain.iter().skip(1) {
            node = node.children.iter_mut().find(|c| c.id == *step)?;
        }
        Some(node)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Ids from the root down to the parent of `id`. Empty for the root.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut chain = self.chain(id).ok_or(TreeError::NodeNotFound(id))?;
        chain.pop();
        Ok(chain)
    }

    /// Slash-separated name path below the root; `/` is the root itself.
    pub fn path_of(&self, id: NodeId) -> Result<String, TreeError> {
        let chain = self.chain(id).ok_or(TreeError::NodeNotFound(id))?;
        if chain.len() == 1 {
            return Ok("/".to_string());
        }
        let mut path = String::new();
        let mut node = &self.root;
        for step in chain.iter().skip(1) {
            node = node.child(*step).ok_or(TreeError::NodeNotFound(*step))?;
            path.push('/');
            path.push_str(&node.name);
        }
        Ok(path)
    }

    /// Resolve a name path such as `/Geometry/P1`. The first matching child
    /// wins when siblings share a name.
    pub fn resolve_path(&self, path: &str) -> Option<NodeId> {
        let mut node = &self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            node = node.child_named(part)?;
        }
        Some(node.id)
    }

    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<&Node> {
        self.get(parent)?.child_named(name)
    }

    /// Pre-order walk over every node.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![&self.root],
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<Change, TreeError> {
        let key = key.into();
        let value = value.into();
        if !value.is_finite() {
            return Err(TreeError::InvalidMutation(format!(
                "attribute '{}' must be finite, got {}",
                key, value
            )));
        }
        let node = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        let before = node.attributes.insert(key.clone(), value.clone());
        Ok(Change::Attribute {
            node: id,
            key,
            before,
            after: Some(value),
        })
    }

    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Result<Change, TreeError> {
        let node = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        let before = node.attributes.remove(key);
        Ok(Change::Attribute {
            node: id,
            key: key.to_string(),
            before,
            after: None,
        })
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<Change, TreeError> {
        let name = name.into();
        let node = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        let before = std::mem::replace(&mut node.name, name.clone());
        Ok(Change::Renamed {
            node: id,
            before,
            after: name,
        })
    }

    /// Insert `node` as child number `index` of `parent`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: Node) -> Result<Change, TreeError> {
        if let Some((name, key)) = node.first_non_finite() {
            return Err(TreeError::InvalidMutation(format!(
                "attribute '{}' of '{}' must be finite",
                key, name
            )));
        }
        let mut incoming = HashSet::new();
        for id in node.subtree_ids() {
            if self.contains(id) || !incoming.insert(id) {
                return Err(TreeError::InvalidMutation(format!(
                    "node id {} is already in the tree",
                    id
                )));
            }
        }

        let parent_node = self.get_mut(parent).ok_or(TreeError::NodeNotFound(parent))?;
        if index > parent_node.children.len() {
            return Err(TreeError::InvalidMutation(format!(
                "index {} out of range for '{}' with {} children",
                index,
                parent_node.name,
                parent_node.children.len()
            )));
        }

        let subtree = NodeDocument::from_node(&node);
        let mut seen = HashSet::new();
        // Ids were checked above, so indexing cannot fail.
        let _ = index_subtree(&node, Some(parent), &mut self.parents, &mut seen);
        if let Some(parent_node) = self.get_mut(parent) {
            parent_node.children.insert(index, node);
        }
        Ok(Change::ChildInserted {
            parent,
            index,
            subtree,
        })
    }

    pub fn append_child(&mut self, parent: NodeId, node: Node) -> Result<Change, TreeError> {
        let index = self
            .get(parent)
            .map(|p| p.children.len())
            .ok_or(TreeError::NodeNotFound(parent))?;
        self.insert_child(parent, index, node)
    }

    /// Detach `child` from `parent`, returning it with the change record.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(Node, Change), TreeError> {
        if !self.contains(child) {
            return Err(TreeError::NodeNotFound(child));
        }
        let parent_node = self.get_mut(parent).ok_or(TreeError::NodeNotFound(parent))?;
        let index = parent_node
            .children
            .iter()
            .position(|c| c.id == child)
            .ok_or_else(|| {
                TreeError::InvalidMutation(format!("{} is not a child of {}", child, parent))
            })?;
        let removed = parent_node.children.remove(index);
        for id in removed.subtree_ids() {
            self.parents.remove(&id);
        }
        let change = Change::ChildRemoved {
            parent,
            index,
            subtree: NodeDocument::from_node(&removed),
        };
        Ok((removed, change))
    }

    /// Detach `id` from wherever it sits. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<(Node, Change), TreeError> {
        if id == self.root.id {
            return Err(TreeError::InvalidMutation("the root node cannot be removed".into()));
        }
        let parent = self.parent_of(id).ok_or(TreeError::NodeNotFound(id))?;
        self.remove_child(parent, id)
    }

    /// Put `node` where `old` was. Produces a removal and an insertion.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, node: Node) -> Result<Vec<Change>, TreeError> {
        let (removed, removal) = self.remove_child(parent, old)?;
        let index = match &removal {
            Change::ChildRemoved { index, .. } => *index,
            _ => 0,
        };
        match self.insert_child(parent, index, node) {
            Ok(insertion) => Ok(vec![removal, insertion]),
            Err(err) => {
                self.insert_child(parent, index, removed)?;
                Err(err)
            }
        }
    }

    /// Apply `change` forward.
    ///
    /// Idempotent: re-inserting a node that is already in place, removing one
    /// that is already gone, or setting a value that is already set all leave
    /// the tree unchanged. Inserted subtrees are rebuilt through `registry`.
    pub fn apply_change(&mut self, change: &Change, registry: &NodeRegistry) -> Result<(), TreeError> {
        match change {
            Change::Attribute { node, key, after, .. } => {
                let target = self.get_mut(*node).ok_or(TreeError::NodeNotFound(*node))?;
                match after {
                    Some(value) => {
                        target.attributes.insert(key.clone(), value.clone());
                    }
                    None => {
                        target.attributes.remove(key);
                    }
                }
                Ok(())
            }
            Change::Renamed { node, after, .. } => {
                let target = self.get_mut(*node).ok_or(TreeError::NodeNotFound(*node))?;
                target.name = after.clone();
                Ok(())
            }
            Change::ChildInserted {
                parent,
                index,
                subtree,
            } => {
                if self.contains(subtree.id) {
                    return if self.parent_of(subtree.id) == Some(*parent) {
                        Ok(())
                    } else {
                        Err(TreeError::InvalidMutation(format!(
                            "node {} already exists under another parent",
                            subtree.id
                        )))
                    };
                }
                let len = self
                    .get(*parent)
                    .map(|p| p.children.len())
                    .ok_or(TreeError::NodeNotFound(*parent))?;
                let node = subtree.to_node(registry)?;
                self.insert_child(*parent, (*index).min(len), node).map(|_| ())
            }
            Change::ChildRemoved { parent, subtree, .. } => {
                if !self.contains(subtree.id) {
                    return Ok(());
                }
                if self.parent_of(subtree.id) != Some(*parent) {
                    return Err(TreeError::InvalidMutation(format!(
                        "node {} is not a child of {}",
                        subtree.id, parent
                    )));
                }
                self.remove_child(*parent, subtree.id).map(|_| ())
            }
        }
    }

    pub fn to_document(&self) -> NodeDocument {
        NodeDocument::from_node(&self.root)
    }

    pub fn to_json(&self) -> Result<String, TreeError> {
        self.to_document().to_json()
    }

    /// Strict load: any unknown type fails the whole document.
    pub fn from_document(doc: &NodeDocument, registry: &NodeRegistry) -> Result<Self, TreeError> {
        Self::new(doc.to_node(registry)?)
    }

    /// Lenient load: unreadable subtrees are skipped and returned alongside
    /// the tree.
    pub fn from_document_lenient(
        doc: &NodeDocument,
        registry: &NodeRegistry,
    ) -> Result<(Self, Vec<TreeError>), TreeError> {
        let mut skipped = Vec::new();
        let root = doc.to_node_lenient(registry, &mut skipped)?;
        Ok((Self::new(root)?, skipped))
    }

    pub fn from_json(bytes: &[u8], registry: &NodeRegistry) -> Result<Self, TreeError> {
        Self::from_document(&NodeDocument::from_json(bytes)?, registry)
    }

    /// Hex BLAKE3 digest of the whole tree.
    pub fn fingerprint(&self) -> String {
        hasher::fingerprint(&self.root)
    }

    /// Root-first id chain ending at `id`.
    fn chain(&self, id: NodeId) -> Option<Vec<NodeId>> {
        if !self.contains(id) {
            return None;
        }
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parents.get(&current) {
            chain.push(*parent);
            current = *parent;
        }
        chain.reverse();
        Some(chain)
    }
}

/// Record parent links for `node`'s subtree. Returns the first repeated id.
fn index_subtree(
    node: &Node,
    parent: Option<NodeId>,
    parents: &mut HashMap<NodeId, NodeId>,
    seen: &mut HashSet<NodeId>,
) -> Result<(), NodeId> {
    if !seen.insert(node.id) {
        return Err(node.id);
    }
    if let Some(parent) = parent {
        parents.insert(node.id, parent);
    }
    for child in &node.children {
        index_subtree(child, Some(node.id), parents, seen)?;
    }
    Ok(())
}

/// Pre-order iterator returned by [`ProjectTree::walk`].
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
