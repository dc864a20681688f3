//! Memento Engine / Command History
//!
//! Transactions collect the [`Change`] records produced by tracked tree
//! mutations into one pending memento. Committing pushes it on the undo stack;
//! rolling back reverts it. Undo and redo replay a memento's changes backward
//! or forward against the live tree, resolving nodes by id at apply time.
//!
//! Transaction state machine: Idle -> Open -> (Committed | RolledBack) -> Idle.
//! Transactions never nest.

use crate::error::HistoryError;
use crate::tree::{Change, NodeRegistry, ProjectTree};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An immutable, committed unit of undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memento {
    seq: u64,
    label: String,
    timestamp: DateTime<Utc>,
    changes: Vec<Change>,
}

impl Memento {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

#[derive(Debug)]
struct Pending {
    label: String,
    changes: Vec<Change>,
}

/// Linear undo/redo history for one project tree.
#[derive(Debug)]
pub struct CommandHistory {
    undo: Vec<Memento>,
    redo: Vec<Memento>,
    pending: Option<Pending>,
    next_seq: u64,
    max_depth: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::with_max_depth(0)
    }

    /// History that keeps at most `max_depth` undo entries (0 = unbounded).
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            pending: None,
            next_seq: 1,
            max_depth,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_label(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.label.as_str())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.changes.len())
    }

    pub fn begin(&mut self, label: impl Into<String>) -> Result<(), HistoryError> {
        if let Some(pending) = &self.pending {
            return Err(HistoryError::TransactionAlreadyOpen(pending.label.clone()));
        }
        let label = label.into();
        debug!(label = %label, "Transaction opened");
        self.pending = Some(Pending {
            label,
            changes: Vec::new(),
        });
        Ok(())
    }

    /// Append a change to the open transaction.
    ///
    /// Returns `false` when nothing was recorded: no transaction is open, or
    /// the change is a no-op.
    pub fn record(&mut self, change: Change) -> bool {
        match &mut self.pending {
            Some(pending) if !change.is_noop() => {
                pending.changes.push(change);
                true
            }
            _ => false,
        }
    }

    /// Close the open transaction.
    ///
    /// Returns the new memento's sequence number, or `None` if the
    /// transaction recorded nothing (no undo entry is created and the redo
    /// stack is kept).
    pub fn commit(&mut self) -> Result<Option<u64>, HistoryError> {
        let pending = self.pending.take().ok_or(HistoryError::NoTransaction)?;
        if pending.changes.is_empty() {
            debug!(label = %pending.label, "Empty transaction closed");
            return Ok(None);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(seq, label = %pending.label, changes = pending.changes.len(), "Transaction committed");
        self.undo.push(Memento {
            seq,
            label: pending.label,
            timestamp: Utc::now(),
            changes: pending.changes,
        });
        self.redo.clear();
        if self.max_depth > 0 && self.undo.len() > self.max_depth {
            let excess = self.undo.len() - self.max_depth;
            self.undo.drain(..excess);
        }
        Ok(Some(seq))
    }

    /// Close the open transaction without touching any tree. Returns the
    /// changes it had recorded.
    pub fn discard(&mut self) -> Result<Vec<Change>, HistoryError> {
        let pending = self.pending.take().ok_or(HistoryError::NoTransaction)?;
        debug!(label = %pending.label, changes = pending.changes.len(), "Transaction discarded");
        Ok(pending.changes)
    }

    /// Revert the open transaction's changes, newest first, and discard it.
    ///
    /// If a change cannot be reverted the tree is restored to its state before
    /// the rollback, the transaction is still discarded, and
    /// `UndoApplication` is returned.
    pub fn rollback(&mut self, tree: &mut ProjectTree, registry: &NodeRegistry) -> Result<(), HistoryError> {
        let pending = self.pending.take().ok_or(HistoryError::NoTransaction)?;
        debug!(label = %pending.label, changes = pending.changes.len(), "Rolling back transaction");
        let inverses: Vec<Change> = pending.changes.iter().rev().map(Change::inverse).collect();
        apply_atomically(tree, registry, &pending.label, &inverses)
    }

    /// Revert the most recent memento and move it to the redo stack.
    pub fn undo(&mut self, tree: &mut ProjectTree, registry: &NodeRegistry) -> Result<&Memento, HistoryError> {
        self.ensure_idle()?;
        let memento = self.undo.last().ok_or(HistoryError::NothingToUndo)?;
        let inverses: Vec<Change> = memento.changes.iter().rev().map(Change::inverse).collect();
        apply_atomically(tree, registry, &memento.label, &inverses)?;

        let memento = self.undo.pop().ok_or(HistoryError::NothingToUndo)?;
        debug!(seq = memento.seq, label = %memento.label, "Undone");
        self.redo.push(memento);
        self.redo.last().ok_or(HistoryError::NothingToUndo)
    }

    /// Re-apply the most recently undone memento.
    pub fn redo(&mut self, tree: &mut ProjectTree, registry: &NodeRegistry) -> Result<&Memento, HistoryError> {
        self.ensure_idle()?;
        let memento = self.redo.last().ok_or(HistoryError::NothingToRedo)?;
        apply_atomically(tree, registry, &memento.label, &memento.changes)?;

        let memento = self.redo.pop().ok_or(HistoryError::NothingToRedo)?;
        debug!(seq = memento.seq, label = %memento.label, "Redone");
        self.undo.push(memento);
        self.undo.last().ok_or(HistoryError::NothingToRedo)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Undo entries, most recent first.
    pub fn undo_labels(&self) -> Vec<&str> {
        self.undo.iter().rev().map(|m| m.label.as_str()).collect()
    }

    /// Redo entries, next to redo first.
    pub fn redo_labels(&self) -> Vec<&str> {
        self.redo.iter().rev().map(|m| m.label.as_str()).collect()
    }

    /// Undo stack, oldest first.
    pub fn undo_stack(&self) -> &[Memento] {
        &self.undo
    }

    pub fn redo_stack(&self) -> &[Memento] {
        &self.redo
    }

    /// Drop both stacks. An open transaction is left alone.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn ensure_idle(&self) -> Result<(), HistoryError> {
        match &self.pending {
            Some(pending) => Err(HistoryError::TransactionAlreadyOpen(pending.label.clone())),
            None => Ok(()),
        }
    }
}

/// Apply `changes` in order, or none of them.
fn apply_atomically(
    tree: &mut ProjectTree,
    registry: &NodeRegistry,
    label: &str,
    changes: &[Change],
) -> Result<(), HistoryError> {
    let snapshot = tree.clone();
    for change in changes {
        if let Err(err) = tree.apply_change(change, registry) {
            warn!(label, change = %change.describe(), error = %err, "Change could not be applied, restoring tree");
            *tree = snapshot;
            return Err(HistoryError::UndoApplication {
                label: label.to_string(),
                reason: format!("{}: {}", change.describe(), err),
            });
        }
    }
    Ok(())
}
