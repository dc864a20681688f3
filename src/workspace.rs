//! Workspace/Session Store
//!
//! A workspace is a named set of project references plus session state (the
//! last active project and free-form preferences). Workspaces live in a sled
//! database keyed by name ([`WorkspaceStore`]), can be exported to and
//! imported from JSON files, and share the database with the [`RunLog`].
//! Project trees themselves are stored as standalone files
//! ([`project_file`]).

pub mod project_file;
pub mod run_log;
pub mod store;

pub use project_file::LoadedProject;
pub use run_log::{RunLog, RunRecord};
pub use store::WorkspaceStore;

use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the workspace used when nothing else was selected.
pub const DEFAULT_WORKSPACE: &str = "default";

/// A project entry in a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRef {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub project_refs: Vec<ProjectRef>,
    #[serde(default)]
    pub active_project: Option<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(DEFAULT_WORKSPACE)
    }
}

impl Workspace {
    /// Empty workspace called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            project_refs: Vec::new(),
            active_project: None,
            preferences: BTreeMap::new(),
        }
    }

    pub fn project(&self, name: &str) -> Option<&ProjectRef> {
        self.project_refs.iter().find(|p| p.name == name)
    }

    /// Add a project reference. Names are unique within a workspace.
    pub fn add_project(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Result<(), StorageError> {
        let name = name.into();
        if self.project(&name).is_some() {
            return Err(StorageError::InvalidWorkspace(format!(
                "project '{}' is already in workspace '{}'",
                name, self.name
            )));
        }
        self.project_refs.push(ProjectRef {
            name,
            path: path.into(),
        });
        Ok(())
    }

    /// Remove a project reference; clears the active project if it was this one.
    pub fn remove_project(&mut self, name: &str) -> Result<ProjectRef, StorageError> {
        let index = self
            .project_refs
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                StorageError::InvalidWorkspace(format!(
                    "project '{}' is not in workspace '{}'",
                    name, self.name
                ))
            })?;
        if self.active_project.as_deref() == Some(name) {
            self.active_project = None;
        }
        Ok(self.project_refs.remove(index))
    }

    pub fn set_active_project(&mut self, name: &str) -> Result<(), StorageError> {
        if self.project(name).is_none() {
            return Err(StorageError::InvalidWorkspace(format!(
                "project '{}' is not in workspace '{}'",
                name, self.name
            )));
        }
        self.active_project = Some(name.to_string());
        Ok(())
    }

    pub fn set_preference(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.preferences.insert(key.into(), value.into());
    }

    /// References whose file does not exist (any more).
    pub fn missing_projects(&self) -> Vec<&ProjectRef> {
        self.project_refs.iter().filter(|p| !p.path.exists()).collect()
    }

    /// Read a workspace exported with [`save_file`](Self::save_file).
    pub fn load_file(path: &Path) -> Result<Self, StorageError> {
        let raw = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::WorkspaceNotFound(path.display().to_string()),
            _ => StorageError::IoError(e),
        })?;
        serde_json::from_slice(&raw).map_err(|e| StorageError::CorruptWorkspace {
            name: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Like [`load_file`](Self::load_file), but falls back to an empty
    /// default workspace and hands back the error instead of failing.
    pub fn load_file_or_default(path: &Path) -> (Self, Option<StorageError>) {
        match Self::load_file(path) {
            Ok(workspace) => (workspace, None),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Falling back to default workspace");
                (Self::default(), Some(err))
            }
        }
    }

    pub fn save_file(&self, path: &Path) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }
}

pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.trim().is_empty() {
        return Err(StorageError::InvalidWorkspace("workspace name cannot be empty".into()));
    }
    Ok(())
}
