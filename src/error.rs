//! Error types for the Loom process and project state core.

use crate::types::NodeId;
use thiserror::Error;

/// Type registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Type '{type_id}' is already registered in the {registry} registry with a different factory")]
    DuplicateType {
        registry: &'static str,
        type_id: String,
    },

    #[error("Unknown {registry} type: {type_id}")]
    UnknownType {
        registry: &'static str,
        type_id: String,
    },
}

/// Project tree errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Corrupt data at '{path}': {reason}")]
    CorruptData { path: String, reason: String },

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),
}

impl TreeError {
    pub fn corrupt(path: impl Into<String>, reason: impl Into<String>) -> Self {
        TreeError::CorruptData {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Command history and transaction errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("A transaction is already open: {0}")]
    TransactionAlreadyOpen(String),

    #[error("No transaction is open")]
    NoTransaction,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Failed to apply '{label}': {reason}")]
    UndoApplication { label: String, reason: String },
}

/// Process execution errors
///
/// Every variant is isolated to the process that raised it; the executor turns
/// them into a `Failed` or `Aborted` status and rolls the transaction back.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(transparent)]
    UnknownType(#[from] RegistryError),

    #[error("{step}: {source:#}")]
    Calculator {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{step} panicked: {message}")]
    Panicked { step: String, message: String },

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Corrupt workspace '{name}': {reason}")]
    CorruptWorkspace { name: String, reason: String },

    #[error("Invalid workspace operation: {0}")]
    InvalidWorkspace(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// Aggregate error for the public API surface and the CLI
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0} not found")]
    ProcessNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
