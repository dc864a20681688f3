//! Project files on disk.

use crate::error::{ApiError, StorageError, TreeError};
use crate::project::Project;
use crate::tree::{NodeDocument, NodeRegistry, ProjectTree};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A project read from disk plus whatever had to be left out.
#[derive(Debug)]
pub struct LoadedProject {
    pub project: Project,
    /// Subtrees that referenced unknown types and were skipped.
    pub skipped: Vec<TreeError>,
}

/// Write `project`'s tree to `path`, replacing the file atomically.
pub fn save(path: &Path, project: &Project) -> Result<(), StorageError> {
    let json = project
        .tree()
        .to_json()
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    fs::write(&tmp, json.as_bytes())?;
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), project = project.name(), "Project saved");
    Ok(())
}

/// Sibling of `path` with `.tmp` appended to the full file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a project file. Subtrees of unknown type are skipped and reported
/// rather than failing the load; an unknown root type still fails.
pub fn load(path: &Path, registry: Arc<NodeRegistry>) -> Result<LoadedProject, ApiError> {
    let raw = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ApiError::ProjectNotFound(path.display().to_string()),
        _ => ApiError::Storage(StorageError::IoError(e)),
    })?;
    let doc = NodeDocument::from_json(&raw).map_err(|e| match e {
        TreeError::CorruptData { reason, .. } => {
            TreeError::corrupt(path.display().to_string(), reason)
        }
        other => other,
    })?;
    let (tree, skipped) = ProjectTree::from_document_lenient(&doc, &registry)?;
    for err in &skipped {
        warn!(path = %path.display(), error = %err, "Skipped part of project");
    }
    Ok(LoadedProject {
        project: Project::from_tree(tree, registry),
        skipped,
    })
}
