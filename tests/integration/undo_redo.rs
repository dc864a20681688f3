//! Undo/redo across committed transactions

use loom::error::HistoryError;
use loom::tree::Node;

use crate::integration::test_utils::{create_point, project, registries};

#[test]
fn undo_all_then_redo_all_restores_final_state() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let initial = project.tree().to_json().unwrap();

    let p1 = create_point(&mut project, "P1");
    project
        .transact("move P1", |p| p.set_attribute(p1, "x", 3.0).map_err(loom::error::ApiError::from))
        .unwrap();
    project
        .transact("rename P1", |p| p.rename(p1, "Apex").map_err(loom::error::ApiError::from))
        .unwrap();
    let final_state = project.tree().to_json().unwrap();

    for _ in 0..3 {
        project.undo().unwrap();
    }
    assert_eq!(project.tree().to_json().unwrap(), initial);
    assert!(matches!(project.undo(), Err(HistoryError::NothingToUndo)));

    for _ in 0..3 {
        project.redo().unwrap();
    }
    assert_eq!(project.tree().to_json().unwrap(), final_state);
    assert!(!project.can_redo());
}

#[test]
fn new_commit_discards_redo_entries() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    create_point(&mut project, "P1");
    create_point(&mut project, "P2");
    create_point(&mut project, "P3");

    project.undo().unwrap();
    project.undo().unwrap();
    assert_eq!(project.history().redo_labels(), vec!["create P2", "create P3"]);

    create_point(&mut project, "P4");
    assert!(!project.can_redo());
    assert_eq!(project.history().undo_labels(), vec!["create P4", "create P1"]);
}

#[test]
fn undo_is_refused_while_a_transaction_is_open() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    create_point(&mut project, "P1");

    project.begin("edit").unwrap();
    assert!(matches!(
        project.undo(),
        Err(HistoryError::TransactionAlreadyOpen(_))
    ));
    project.rollback().unwrap();
    project.undo().unwrap();
}

#[test]
fn removing_a_subtree_is_undoable() {
    let registries = registries();
    let mut project = project(&registries, "bridge");
    let root = project.root_id();
    let folder = Node::new("Folder", "Geometry").with_child(Node::new("Point", "P1"));
    project
        .transact("add geometry", |p| p.append_child(root, folder).map_err(loom::error::ApiError::from))
        .unwrap();
    let with_geometry = project.tree().to_json().unwrap();

    let geometry = project.tree().resolve_path("/Geometry").unwrap();
    project
        .transact("drop geometry", |p| p.remove(geometry).map_err(loom::error::ApiError::from))
        .unwrap();
    assert!(project.tree().resolve_path("/Geometry/P1").is_none());

    project.undo().unwrap();
    assert_eq!(project.tree().to_json().unwrap(), with_geometry);
}

/// An undo that cannot be applied completely leaves both the tree and the
/// history exactly as they were.
#[test]
fn failed_undo_is_all_or_nothing() {
    use loom::history::CommandHistory;
    use loom::tree::ProjectTree;

    let registries = registries();
    let point = Node::new("Point", "P1");
    let p1 = point.id();
    let mut tree = ProjectTree::new(Node::new("Project", "bridge").with_child(point)).unwrap();
    let root = tree.root_id();
    let mut history = CommandHistory::new();

    history.begin("edit").unwrap();
    history.record(tree.set_attribute(p1, "x", 1.0).unwrap());
    history.record(tree.append_child(root, Node::new("Point", "Q")).unwrap());
    history.commit().unwrap();

    // Untracked edit: the memento now refers to a node that is gone.
    tree.remove(p1).unwrap();
    let before = tree.to_json().unwrap();

    let err = history.undo(&mut tree, &registries.nodes).unwrap_err();
    assert!(matches!(err, HistoryError::UndoApplication { ref label, .. } if label == "edit"));
    assert_eq!(tree.to_json().unwrap(), before);
    assert!(tree.resolve_path("/Q").is_some());
    assert_eq!(history.undo_labels(), vec!["edit"]);
    assert!(!history.can_redo());
}
