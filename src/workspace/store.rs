//! Durable sled-backed workspace store.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use tracing::{debug, info, instrument, warn};

use crate::error::StorageError;
use crate::workspace::{validate_name, Workspace, DEFAULT_WORKSPACE};

const TREE_WORKSPACES: &str = "workspaces";
const TREE_META: &str = "workspace_meta";
const ACTIVE_KEY: &[u8] = b"active";

#[derive(Clone)]
pub struct WorkspaceStore {
    db: Db,
    workspaces: Tree,
    meta: Tree,
}

impl WorkspaceStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let workspaces = db.open_tree(TREE_WORKSPACES).map_err(to_storage_db)?;
        let meta = db.open_tree(TREE_META).map_err(to_storage_db)?;
        Ok(Self {
            db,
            workspaces,
            meta,
        })
    }

    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(to_storage_db)?;
        Self::new(db)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    #[instrument(skip_all, fields(workspace = %workspace.name))]
    pub fn save(&self, workspace: &Workspace) -> Result<(), StorageError> {
        validate_name(&workspace.name)?;
        let value = serde_json::to_vec(workspace).map_err(to_storage_data)?;
        self.workspaces
            .insert(workspace.name.as_bytes(), value)
            .map_err(to_storage_db)?;
        debug!("Workspace saved");
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Workspace, StorageError> {
        let Some(raw) = self.workspaces.get(name.as_bytes()).map_err(to_storage_db)? else {
            return Err(StorageError::WorkspaceNotFound(name.to_string()));
        };
        serde_json::from_slice(&raw).map_err(|e| StorageError::CorruptWorkspace {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Load `name`, falling back to an empty default workspace when it is
    /// missing or unreadable. The error, if any, is returned alongside.
    pub fn load_or_default(&self, name: &str) -> (Workspace, Option<StorageError>) {
        match self.load(name) {
            Ok(workspace) => (workspace, None),
            Err(err) => {
                warn!(workspace = name, error = %err, "Falling back to default workspace");
                (Workspace::default(), Some(err))
            }
        }
    }

    pub fn exists(&self, name: &str) -> Result<bool, StorageError> {
        self.workspaces
            .contains_key(name.as_bytes())
            .map_err(to_storage_db)
    }

    /// Stored workspace names, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        for result in self.workspaces.iter() {
            let (key, _) = result.map_err(to_storage_db)?;
            names.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(names)
    }

    /// Delete a stored workspace. The default and the active workspace
    /// cannot be deleted.
    pub fn delete(&self, name: &str) -> Result<(), StorageError> {
        if name == DEFAULT_WORKSPACE {
            return Err(StorageError::InvalidWorkspace(
                "the default workspace cannot be deleted".into(),
            ));
        }
        if self.active()? == name {
            return Err(StorageError::InvalidWorkspace(format!(
                "workspace '{}' is active; switch to another workspace first",
                name
            )));
        }
        if self.workspaces.remove(name.as_bytes()).map_err(to_storage_db)?.is_none() {
            return Err(StorageError::WorkspaceNotFound(name.to_string()));
        }
        info!(workspace = name, "Workspace deleted");
        Ok(())
    }

    /// Name of the active workspace; `default` until something else is
    /// selected.
    pub fn active(&self) -> Result<String, StorageError> {
        Ok(self
            .meta
            .get(ACTIVE_KEY)
            .map_err(to_storage_db)?
            .map(|raw| String::from_utf8_lossy(&raw).into_owned())
            .unwrap_or_else(|| DEFAULT_WORKSPACE.to_string()))
    }

    /// Make `name` the active workspace. It must exist, except for the
    /// default workspace, which is created on demand.
    pub fn set_active(&self, name: &str) -> Result<(), StorageError> {
        if !self.exists(name)? {
            if name != DEFAULT_WORKSPACE {
                return Err(StorageError::WorkspaceNotFound(name.to_string()));
            }
            self.save(&Workspace::default())?;
        }
        self.meta
            .insert(ACTIVE_KEY, name.as_bytes())
            .map_err(to_storage_db)?;
        info!(workspace = name, "Active workspace changed");
        Ok(())
    }

    /// Load the active workspace, falling back to the default one.
    pub fn load_active(&self) -> Result<(Workspace, Option<StorageError>), StorageError> {
        let name = self.active()?;
        Ok(self.load_or_default(&name))
    }

    /// Rename a workspace. Neither the default nor the active workspace can
    /// be renamed, and `new` must be free.
    pub fn rename(&self, old: &str, new: &str) -> Result<(), StorageError> {
        validate_name(new)?;
        if old == DEFAULT_WORKSPACE || self.active()? == old {
            return Err(StorageError::InvalidWorkspace(format!(
                "workspace '{}' is the default or active workspace and cannot be renamed",
                old
            )));
        }
        let mut workspace = self.load(old)?;
        workspace.name = new.to_string();
        let value = serde_json::to_vec(&workspace).map_err(to_storage_data)?;

        self.workspaces
            .transaction(|tx| {
                if tx.get(new.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(StorageError::InvalidWorkspace(
                        format!("workspace '{}' already exists", new),
                    )));
                }
                tx.insert(new.as_bytes(), value.as_slice())?;
                tx.remove(old.as_bytes())?;
                Ok(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => to_storage_db(e),
            })?;
        info!(from = old, to = new, "Workspace renamed");
        Ok(())
    }

    /// Copy `source` to a new workspace called `target`.
    pub fn duplicate(&self, source: &str, target: &str) -> Result<Workspace, StorageError> {
        validate_name(target)?;
        if self.exists(target)? {
            return Err(StorageError::InvalidWorkspace(format!(
                "workspace '{}' already exists",
                target
            )));
        }
        let mut workspace = self.load(source)?;
        workspace.name = target.to_string();
        self.save(&workspace)?;
        info!(from = source, to = target, "Workspace duplicated");
        Ok(workspace)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(to_storage_db)?;
        Ok(())
    }
}

fn to_storage_db(err: sled::Error) -> StorageError {
    StorageError::Database(err.to_string())
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::Serialization(err.to_string())
}
