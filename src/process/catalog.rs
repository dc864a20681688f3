//! Processes stored inside the project tree.
//!
//! A project keeps its processes as `Task` nodes under a `ProcessData` node
//! directly below the root:
//!
//! ```text
//! Project "bridge"
//! └── ProcessData "Processes"
//!     ├── Task "move P1"            target = "/Geometry/P1"
//!     │   ├── SetAttribute "shift"  key = "x", value = 4.0
//!     │   └── Task "report"         skip = true
//!     │       └── Warn "note"       message = "..."
//!     └── TaskGroup "checks"
//!         └── Task "audit"
//! ```
//!
//! Tasks directly under `ProcessData` form the default group, together with
//! the tasks of a `TaskGroup` named [`DEFAULT_GROUP`]. Every other
//! `TaskGroup` is a named group whose tasks are only found when the group is
//! given.
//!
//! Nested `Task` nodes become sub-processes. Any other child becomes a step
//! whose calculator type is the child's type id and whose parameters are its
//! attributes.

use crate::process::{Process, Step, Target};
use crate::tree::{Node, ProjectTree};
use crate::types::Attributes;
use std::collections::BTreeMap;

/// Node type of the container holding a project's processes.
pub const PROCESS_DATA_TYPE: &str = "ProcessData";
/// Node type of one stored process.
pub const TASK_TYPE: &str = "Task";
/// Node type of a named group of stored processes.
pub const TASK_GROUP_TYPE: &str = "TaskGroup";
/// Group of the tasks stored directly under the process container.
pub const DEFAULT_GROUP: &str = "default";

const TARGET_ATTR: &str = "target";
const SKIP_ATTR: &str = "skip";

pub struct ProcessCatalog;

impl ProcessCatalog {
    /// Build the process called `name` from the default group, if any.
    pub fn find(tree: &ProjectTree, name: &str) -> Option<Process> {
        Self::find_in_group(tree, DEFAULT_GROUP, name)
    }

    /// Build the process called `name` from `group`, if any.
    pub fn find_in_group(tree: &ProjectTree, group: &str, name: &str) -> Option<Process> {
        Self::entries(tree)
            .find(|(task_group, task)| *task_group == group && task.name() == name)
            .map(|(_, task)| Self::from_task(task))
    }

    /// Names of the processes in the default group, in tree order.
    pub fn names(tree: &ProjectTree) -> Vec<String> {
        Self::groups(tree).remove(DEFAULT_GROUP).unwrap_or_default()
    }

    /// Process names keyed by group. Groups without tasks are listed empty.
    pub fn groups(tree: &ProjectTree) -> BTreeMap<String, Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for group in Self::containers(tree).filter(|node| node.type_id() == TASK_GROUP_TYPE) {
            groups.entry(group.name().to_string()).or_default();
        }
        for (group, task) in Self::entries(tree) {
            groups
                .entry(group.to_string())
                .or_default()
                .push(task.name().to_string());
        }
        groups
    }

    fn containers(tree: &ProjectTree) -> impl Iterator<Item = &Node> {
        tree.root()
            .children()
            .iter()
            .filter(|child| child.type_id() == PROCESS_DATA_TYPE)
            .flat_map(|data| data.children().iter())
    }

    /// Every stored task with the group it belongs to.
    fn entries(tree: &ProjectTree) -> impl Iterator<Item = (&str, &Node)> {
        Self::containers(tree).flat_map(|node| {
            let grouped: Vec<(&str, &Node)> = match node.type_id() {
                TASK_TYPE => vec![(DEFAULT_GROUP, node)],
                TASK_GROUP_TYPE => node
                    .children()
                    .iter()
                    .filter(|task| task.type_id() == TASK_TYPE)
                    .map(|task| (node.name(), task))
                    .collect(),
                _ => Vec::new(),
            };
            grouped
        })
    }

    fn from_task(task: &Node) -> Process {
        let mut process = Process::new(task.name()).skip(is_skipped(task));
        if let Some(path) = task.attribute(TARGET_ATTR).and_then(|v| v.as_str()) {
            process = process.target(Target::Path(path.to_string()));
        }

        for child in task.children() {
            if child.type_id() == TASK_TYPE {
                process.push_step(Step::Process(Self::from_task(child)));
            } else {
                let mut parameters: Attributes = child.attributes().clone();
                parameters.remove(SKIP_ATTR);
                process.push_step(Step::Deferred {
                    name: child.name().to_string(),
                    type_id: child.type_id().to_string(),
                    parameters,
                    skipped: is_skipped(child),
                });
            }
        }
        process
    }
}

fn is_skipped(node: &Node) -> bool {
    node.attribute(SKIP_ATTR)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}
