//! Process Executor
//!
//! A [`Process`] is a named unit of work bound to a target node. Its steps are
//! calculators (given directly, or resolved by type id through the calculator
//! registry when the process runs) and nested sub-processes. The
//! [`ProcessExecutor`] runs queued processes one at a time against a project,
//! each inside one transaction, and [`WorkerPool`] runs several projects'
//! queues side by side.

pub mod calculator;
pub mod catalog;
pub mod events;
pub mod executor;
pub mod pool;

pub use calculator::{
    calculator_factory, Calculator, CalculatorRegistry, FnCalculator, TaskContext,
};
pub use catalog::ProcessCatalog;
pub use events::{EventBus, ProcessEvent};
pub use executor::{CancelToken, ProcessExecutor, ProcessHandle, ProcessReport, RunSummary};
pub use pool::{ProjectJob, WorkerPool};

use crate::error::ProcessError;
use crate::tree::ProjectTree;
use crate::types::{Attributes, NodeId, ProcessId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Queued,
    Running,
    Finished,
    FinishedWithWarning,
    Failed,
    Aborted,
}

impl ProcessStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessStatus::Queued => "queued",
            ProcessStatus::Running => "running",
            ProcessStatus::Finished => "finished",
            ProcessStatus::FinishedWithWarning => "finished_with_warning",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Aborted => "aborted",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ProcessStatus::Queued | ProcessStatus::Running)
    }

    /// Finished, with or without warnings.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ProcessStatus::Finished | ProcessStatus::FinishedWithWarning
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The node a process works on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// The project root, or the enclosing process's target for sub-processes.
    #[default]
    Inherit,
    Node(NodeId),
    /// Name path below the root, e.g. `/Geometry/P1`.
    Path(String),
}

impl Target {
    pub(crate) fn resolve(&self, tree: &ProjectTree, inherited: NodeId) -> Result<NodeId, ProcessError> {
        match self {
            Target::Inherit => Ok(inherited),
            Target::Node(id) if tree.contains(*id) => Ok(*id),
            Target::Node(id) => Err(ProcessError::Precondition(format!(
                "target node {} not found",
                id
            ))),
            Target::Path(path) => tree.resolve_path(path).ok_or_else(|| {
                ProcessError::Precondition(format!("target '{}' not found", path))
            }),
        }
    }
}

/// One unit inside a process, run in declaration order.
pub enum Step {
    Calculator {
        name: String,
        calculator: Box<dyn Calculator>,
        skipped: bool,
    },
    /// Calculator looked up by type id when the step runs.
    Deferred {
        name: String,
        type_id: String,
        parameters: Attributes,
        skipped: bool,
    },
    Process(Process),
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Calculator { name, .. } | Step::Deferred { name, .. } => name,
            Step::Process(process) => &process.name,
        }
    }

    pub fn is_skipped(&self) -> bool {
        match self {
            Step::Calculator { skipped, .. } | Step::Deferred { skipped, .. } => *skipped,
            Step::Process(process) => process.skipped,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Calculator { name, skipped, .. } => f
                .debug_struct("Calculator")
                .field("name", name)
                .field("skipped", skipped)
                .finish_non_exhaustive(),
            Step::Deferred {
                name,
                type_id,
                parameters,
                skipped,
            } => f
                .debug_struct("Deferred")
                .field("name", name)
                .field("type_id", type_id)
                .field("parameters", parameters)
                .field("skipped", skipped)
                .finish(),
            Step::Process(process) => fmt::Debug::fmt(process, f),
        }
    }
}

/// A named, orderable unit of work.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    name: String,
    target: Target,
    steps: Vec<Step>,
    skipped: bool,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProcessId::next(),
            name: name.into(),
            target: Target::Inherit,
            steps: Vec::new(),
            skipped: false,
        }
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn target_node(self, id: NodeId) -> Self {
        self.target(Target::Node(id))
    }

    pub fn target_path(self, path: impl Into<String>) -> Self {
        self.target(Target::Path(path.into()))
    }

    /// Add a calculator step.
    pub fn step(mut self, name: impl Into<String>, calculator: impl Calculator + 'static) -> Self {
        self.steps.push(Step::Calculator {
            name: name.into(),
            calculator: Box::new(calculator),
            skipped: false,
        });
        self
    }

    /// Add a step resolved through the calculator registry at run time.
    pub fn deferred(mut self, type_id: impl Into<String>, parameters: Attributes) -> Self {
        let type_id = type_id.into();
        self.steps.push(Step::Deferred {
            name: type_id.clone(),
            type_id,
            parameters,
            skipped: false,
        });
        self
    }

    /// Add a sub-process, run inside this process's transaction.
    pub fn child(mut self, process: Process) -> Self {
        self.steps.push(Step::Process(process));
        self
    }

    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Mark this process as skipped when it runs as a sub-process. Top-level
    /// processes always run.
    pub fn skip(mut self, skipped: bool) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_spec(&self) -> &Target {
        &self.target
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Sub-processes in declaration order.
    pub fn children(&self) -> impl Iterator<Item = &Process> {
        self.steps.iter().filter_map(|step| match step {
            Step::Process(process) => Some(process),
            _ => None,
        })
    }
}
