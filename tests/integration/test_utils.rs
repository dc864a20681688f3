//! Shared fixtures for integration tests

use loom::plugin::Registries;
use loom::project::Project;
use loom::tree::Node;
use loom::types::NodeId;

/// Registries with the core plugin installed.
pub fn registries() -> Registries {
    Registries::with_core().unwrap()
}

/// Empty project named `name`.
pub fn project(registries: &Registries, name: &str) -> Project {
    Project::new(name, registries.nodes.clone()).unwrap()
}

/// Create a `Point` named `name` under the root inside its own committed
/// transaction labeled `create <name>`.
pub fn create_point(project: &mut Project, name: &str) -> NodeId {
    let label = format!("create {}", name);
    project
        .transact(&label, |p| {
            let point = p.create_node("Point", name)?;
            let root = p.root_id();
            Ok::<_, loom::error::ApiError>(p.append_child(root, point)?)
        })
        .unwrap()
}

/// A stored process: `Task` named `name` under a `ProcessData` container,
/// with the given step nodes.
pub fn task(name: &str, steps: Vec<Node>) -> Node {
    steps
        .into_iter()
        .fold(Node::new("Task", name), |task, step| task.with_child(step))
}

pub fn process_data(tasks: Vec<Node>) -> Node {
    tasks
        .into_iter()
        .fold(Node::new("ProcessData", "Processes"), |data, task| data.with_child(task))
}
