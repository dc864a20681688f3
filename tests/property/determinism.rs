//! Property-based tests for serialization and history determinism

use loom::error::ApiError;
use loom::plugin::Registries;
use loom::project::Project;
use loom::tree::ProjectTree;
use loom::types::{AttributeValue, NodeId};
use proptest::prelude::*;

/// One edit, applied in its own transaction.
#[derive(Debug, Clone)]
enum Edit {
    Create(String),
    Set { pick: usize, key: String, value: AttributeValue },
    Rename { pick: usize, name: String },
    Remove { pick: usize },
}

/// Integers and finite floats, extremes included.
fn value_strategy() -> impl Strategy<Value = AttributeValue> {
    prop_oneof![
        any::<i64>().prop_map(AttributeValue::Int),
        (prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO)
            .prop_map(AttributeValue::Float),
        prop_oneof![
            Just(f64::MAX),
            Just(f64::MIN),
            Just(f64::MIN_POSITIVE),
            Just(f64::EPSILON),
            Just(-0.0),
            Just(5e-324),
        ]
        .prop_map(AttributeValue::Float),
    ]
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[A-Z][0-9]{1,2}".prop_map(Edit::Create),
        (any::<usize>(), "[a-z]{1,3}", value_strategy())
            .prop_map(|(pick, key, value)| Edit::Set { pick, key, value }),
        (any::<usize>(), "[a-z]{1,6}").prop_map(|(pick, name)| Edit::Rename { pick, name }),
        any::<usize>().prop_map(|pick| Edit::Remove { pick }),
    ]
}

/// Any node but the root, chosen by `pick`.
fn pick_node(project: &Project, pick: usize) -> Option<NodeId> {
    let ids: Vec<NodeId> = project.tree().walk().skip(1).map(|node| node.id()).collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids[pick % ids.len()])
    }
}

fn apply(project: &mut Project, index: usize, edit: &Edit) -> Result<(), ApiError> {
    let label = format!("edit {}", index);
    project.transact(&label, |p| {
        match edit {
            Edit::Create(name) => {
                let point = p.create_node("Point", name.as_str())?;
                let parent = pick_node(p, index).unwrap_or_else(|| p.root_id());
                p.append_child(parent, point)?;
            }
            Edit::Set { pick, key, value } => {
                let id = pick_node(p, *pick).unwrap_or_else(|| p.root_id());
                p.set_attribute(id, key.as_str(), value.clone())?;
            }
            Edit::Rename { pick, name } => {
                if let Some(id) = pick_node(p, *pick) {
                    p.rename(id, name.as_str())?;
                }
            }
            Edit::Remove { pick } => {
                if let Some(id) = pick_node(p, *pick) {
                    p.remove(id)?;
                }
            }
        }
        Ok::<_, ApiError>(())
    })
}

fn fresh_project(registries: &Registries) -> Project {
    Project::new("bridge", registries.nodes.clone()).unwrap()
}

#[test]
fn test_undo_all_then_redo_all_property() {
    let registries = Registries::with_core().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(edit_strategy(), 1..12), |edits| {
            let mut project = fresh_project(&registries);
            let initial = project.tree().to_json().unwrap();
            for (index, edit) in edits.iter().enumerate() {
                apply(&mut project, index, edit).unwrap();
            }
            let last = project.tree().to_json().unwrap();

            while project.can_undo() {
                project.undo().unwrap();
            }
            prop_assert_eq!(project.tree().to_json().unwrap(), initial);

            while project.can_redo() {
                project.redo().unwrap();
            }
            prop_assert_eq!(project.tree().to_json().unwrap(), last);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_serialization_round_trip_property() {
    let registries = Registries::with_core().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(edit_strategy(), 0..12), |edits| {
            let mut project = fresh_project(&registries);
            for (index, edit) in edits.iter().enumerate() {
                apply(&mut project, index, edit).unwrap();
            }
            let json = project.tree().to_json().unwrap();
            let restored = ProjectTree::from_json(json.as_bytes(), &registries.nodes).unwrap();

            prop_assert_eq!(restored.to_json().unwrap(), json);
            prop_assert_eq!(restored.fingerprint(), project.tree().fingerprint());
            prop_assert_eq!(restored.len(), project.tree().len());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_fingerprint_tracks_content_property() {
    let registries = Registries::with_core().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(any::<i64>(), any::<i64>()), |(a, b)| {
            let mut project = fresh_project(&registries);
            let root = project.root_id();
            project.transact("load a", |p| p.set_attribute(root, "load", a).map_err(ApiError::from)).unwrap();
            let before = project.tree().fingerprint();
            project.transact("load b", |p| p.set_attribute(root, "load", b).map_err(ApiError::from)).unwrap();
            let after = project.tree().fingerprint();

            if a == b {
                prop_assert_eq!(&before, &after);
            } else {
                prop_assert_ne!(&before, &after);
                project.undo().unwrap();
                prop_assert_eq!(project.tree().fingerprint(), before);
            }
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_non_finite_values_never_enter_the_tree_property() {
    let registries = Registries::with_core().unwrap();
    let mut runner = proptest::test_runner::TestRunner::default();
    let non_finite = prop_oneof![
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        prop::num::f64::QUIET_NAN,
    ];

    runner
        .run(&(prop::collection::vec(edit_strategy(), 0..6), non_finite), |(edits, bad)| {
            let mut project = fresh_project(&registries);
            for (index, edit) in edits.iter().enumerate() {
                apply(&mut project, index, edit).unwrap();
            }
            let before = project.tree().to_json().unwrap();
            let root = project.root_id();
            let result = project.transact("bad load", |p| p.set_attribute(root, "load", bad).map_err(ApiError::from));
            prop_assert!(result.is_err());
            prop_assert_eq!(project.tree().to_json().unwrap(), before);
            Ok(())
        })
        .unwrap();
}
