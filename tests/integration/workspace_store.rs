//! Workspace persistence and session state

use loom::error::StorageError;
use loom::workspace::{RunLog, Workspace, WorkspaceStore, DEFAULT_WORKSPACE};
use tempfile::TempDir;

#[test]
fn unknown_workspace_file_yields_default_and_surfaces_error() {
    let dir = TempDir::new().unwrap();
    let (workspace, err) = Workspace::load_file_or_default(&dir.path().join("missing/session.json"));
    assert_eq!(workspace.name, DEFAULT_WORKSPACE);
    assert!(workspace.project_refs.is_empty());
    assert!(matches!(err, Some(StorageError::WorkspaceNotFound(_))));
}

#[test]
fn missing_project_files_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let mut workspace = Workspace::new("design");
    workspace.add_project("ghost", dir.path().join("ghost.json")).unwrap();
    let path = dir.path().join("design.json");
    workspace.save_file(&path).unwrap();

    let loaded = Workspace::load_file(&path).unwrap();
    assert_eq!(loaded.missing_projects().len(), 1);
    assert_eq!(loaded.missing_projects()[0].name, "ghost");
}

#[test]
fn store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("store");
    {
        let store = WorkspaceStore::open(&db_path).unwrap();
        let mut workspace = Workspace::new("design");
        workspace.add_project("bridge", "/projects/bridge.json").unwrap();
        workspace.set_active_project("bridge").unwrap();
        workspace.set_preference("units", "SI");
        store.save(&workspace).unwrap();
        store.set_active("design").unwrap();
        store.flush().unwrap();
    }

    let store = WorkspaceStore::open(&db_path).unwrap();
    assert_eq!(store.active().unwrap(), "design");
    let (workspace, err) = store.load_active().unwrap();
    assert!(err.is_none());
    assert_eq!(workspace.active_project.as_deref(), Some("bridge"));
    assert_eq!(workspace.preferences.get("units").map(String::as_str), Some("SI"));
}

#[test]
fn run_log_shares_the_database() {
    let dir = TempDir::new().unwrap();
    let store = WorkspaceStore::open(&dir.path().join("store")).unwrap();
    let log = RunLog::new(store.db().clone()).unwrap();
    assert!(log.is_empty());
    store.save(&Workspace::new("design")).unwrap();
    assert_eq!(store.list().unwrap(), vec!["design"]);
    assert!(log.recent(10).unwrap().is_empty());
}
