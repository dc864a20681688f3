//! Project tree persistence

use loom::error::TreeError;
use loom::project::Project;
use loom::tree::{Node, NodeDocument, ProjectTree};
use loom::workspace::project_file;
use tempfile::TempDir;

use crate::integration::test_utils::{create_point, project, registries};

fn sample(registries: &loom::plugin::Registries) -> Project {
    let mut project = project(registries, "bridge");
    let root = project.root_id();
    let geometry = Node::new("Folder", "Geometry")
        .with_child(Node::new("Point", "A").with_attribute("x", 1.5).with_attribute("label", "anchor"))
        .with_child(Node::new("Point", "B").with_attribute("fixed", true).with_attribute("index", 7i64));
    project.append_child(root, geometry).unwrap();
    create_point(&mut project, "P1");
    project
}

#[test]
fn serialize_deserialize_serialize_is_byte_identical() {
    let registries = registries();
    let project = sample(&registries);
    let first = project.tree().to_json().unwrap();
    let reloaded = ProjectTree::from_json(first.as_bytes(), &registries.nodes).unwrap();
    let second = reloaded.to_json().unwrap();
    assert_eq!(first, second);
    assert_eq!(project.tree().fingerprint(), reloaded.fingerprint());
}

#[test]
fn node_ids_survive_a_round_trip() {
    let registries = registries();
    let project = sample(&registries);
    let a = project.tree().resolve_path("/Geometry/A").unwrap();
    let reloaded = ProjectTree::from_json(project.tree().to_json().unwrap().as_bytes(), &registries.nodes).unwrap();
    assert_eq!(reloaded.resolve_path("/Geometry/A"), Some(a));
    assert_eq!(reloaded.path_of(a).unwrap(), "/Geometry/A");
}

#[test]
fn strict_load_rejects_unknown_types() {
    let registries = registries();
    let root = Node::new("Project", "bridge").with_child(Node::new("Folder", "F").with_child(Node::new("Hologram", "H")));
    let json = NodeDocument::from_node(&root).to_json().unwrap();

    let err = ProjectTree::from_json(json.as_bytes(), &registries.nodes).unwrap_err();
    match err {
        TreeError::CorruptData { path, .. } => assert_eq!(path, "/bridge/F/H"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn project_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bridge.json");
    let registries = registries();
    let project = sample(&registries);

    project_file::save(&path, &project).unwrap();
    let loaded = project_file::load(&path, registries.nodes.clone()).unwrap();
    assert!(loaded.skipped.is_empty());
    assert_eq!(loaded.project.tree().to_json().unwrap(), project.tree().to_json().unwrap());
    assert!(!loaded.project.can_undo());
}
