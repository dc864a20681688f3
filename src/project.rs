//! Project: a tree, its command history and the node registry it was built
//! with. All user- and process-driven mutations go through here so that they
//! land in the open transaction.

use crate::error::{ApiError, HistoryError, RegistryError, TreeError};
use crate::history::{CommandHistory, Memento};
use crate::tree::{Change, Node, NodeRegistry, ProjectTree};
use crate::types::{AttributeValue, NodeId};
use std::sync::Arc;
use tracing::{debug, info};

/// Root node type of every project created by Loom.
pub const PROJECT_TYPE: &str = "Project";

pub struct Project {
    name: String,
    tree: ProjectTree,
    history: CommandHistory,
    registry: Arc<NodeRegistry>,
    /// Tree as it was when the open transaction began.
    checkpoint: Option<ProjectTree>,
}

impl Project {
    /// Fresh project with a root node of type [`PROJECT_TYPE`].
    pub fn new(name: impl Into<String>, registry: Arc<NodeRegistry>) -> Result<Self, ApiError> {
        let name = name.into();
        let root = registry.create_node(PROJECT_TYPE, name.clone())?;
        let tree = ProjectTree::new(root)?;
        Ok(Self::from_tree(tree, registry))
    }

    /// Wrap an existing tree. The project is named after its root node.
    pub fn from_tree(tree: ProjectTree, registry: Arc<NodeRegistry>) -> Self {
        Self {
            name: tree.root().name().to_string(),
            tree,
            history: CommandHistory::new(),
            registry,
            checkpoint: None,
        }
    }

    pub fn with_history_depth(mut self, max_depth: usize) -> Self {
        self.history = CommandHistory::with_max_depth(max_depth);
        self.checkpoint = None;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root_id()
    }

    pub fn create_node(&self, type_id: &str, name: impl Into<String>) -> Result<Node, RegistryError> {
        self.registry.create_node(type_id, name)
    }

    pub fn begin(&mut self, label: impl Into<String>) -> Result<(), HistoryError> {
        self.history.begin(label)?;
        self.checkpoint = Some(self.tree.clone());
        Ok(())
    }

    pub fn commit(&mut self) -> Result<Option<u64>, HistoryError> {
        let seq = self.history.commit()?;
        self.checkpoint = None;
        if let Some(seq) = seq {
            debug!(project = %self.name, seq, "Committed");
        }
        Ok(seq)
    }

    /// Discard the open transaction and restore the tree captured by
    /// [`begin`](Self::begin). Restoring a snapshot cannot fail halfway.
    pub fn rollback(&mut self) -> Result<(), HistoryError> {
        let discarded = self.history.discard()?;
        if let Some(checkpoint) = self.checkpoint.take() {
            self.tree = checkpoint;
        }
        debug!(project = %self.name, changes = discarded.len(), "Rolled back");
        Ok(())
    }

    pub fn is_transaction_open(&self) -> bool {
        self.history.is_open()
    }

    pub fn undo(&mut self) -> Result<&Memento, HistoryError> {
        let memento = self.history.undo(&mut self.tree, &self.registry)?;
        info!(project = %self.name, label = %memento.label(), "Undo");
        Ok(memento)
    }

    pub fn redo(&mut self) -> Result<&Memento, HistoryError> {
        let memento = self.history.redo(&mut self.tree, &self.registry)?;
        info!(project = %self.name, label = %memento.label(), "Redo");
        Ok(memento)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Run `f` inside a transaction named `label`: commit on `Ok`, roll back
    /// on `Err`.
    pub fn transact<T, E, F>(&mut self, label: &str, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Project) -> Result<T, E>,
        E: From<HistoryError>,
    {
        self.begin(label)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback()?;
                Err(err)
            }
        }
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), TreeError> {
        let change = self.tree.set_attribute(id, key, value)?;
        self.track(change);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Result<(), TreeError> {
        let change = self.tree.remove_attribute(id, key)?;
        self.track(change);
        Ok(())
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), TreeError> {
        let change = self.tree.rename(id, name)?;
        self.track(change);
        Ok(())
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: Node) -> Result<NodeId, TreeError> {
        self.check_registered(&node)?;
        let id = node.id();
        let change = self.tree.insert_child(parent, index, node)?;
        self.track(change);
        Ok(id)
    }

    pub fn append_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, TreeError> {
        self.check_registered(&node)?;
        let id = node.id();
        let change = self.tree.append_child(parent, node)?;
        self.track(change);
        Ok(id)
    }

    pub fn remove(&mut self, id: NodeId) -> Result<Node, TreeError> {
        let (node, change) = self.tree.remove(id)?;
        self.track(change);
        Ok(node)
    }

    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, node: Node) -> Result<NodeId, TreeError> {
        self.check_registered(&node)?;
        let id = node.id();
        for change in self.tree.replace_child(parent, old, node)? {
            self.track(change);
        }
        Ok(id)
    }

    /// Undo and redo rebuild inserted subtrees through the registry, so
    /// tracked inserts only accept registered types.
    fn check_registered(&self, node: &Node) -> Result<(), TreeError> {
        if !self.registry.contains(node.type_id()) {
            return Err(TreeError::InvalidMutation(format!(
                "unknown node type '{}' for '{}'",
                node.type_id(),
                node.name()
            )));
        }
        node.children()
            .iter()
            .try_for_each(|child| self.check_registered(child))
    }

    fn track(&mut self, change: Change) {
        debug!(project = %self.name, change = %change.describe(), "Tree changed");
        self.history.record(change);
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("nodes", &self.tree.len())
            .field("undo", &self.history.undo_stack().len())
            .field("redo", &self.history.redo_stack().len())
            .finish()
    }
}
