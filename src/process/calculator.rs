//! Calculator contract and the per-step task context.

use crate::error::{ProcessError, RegistryError, TreeError};
use crate::process::events::{EventBus, ProcessEvent};
use crate::process::executor::CancelToken;
use crate::project::Project;
use crate::registry::{Factory, TypeRegistry};
use crate::tree::{Node, ProjectTree};
use crate::types::{AttributeValue, Attributes, NodeId, ProcessId};
use std::sync::Arc;
use tracing::warn;

/// Registry of calculator types.
pub type CalculatorRegistry = TypeRegistry<Box<dyn Calculator>>;

/// A building block of a process.
///
/// Calculators only touch the project through [`TaskContext`], so everything
/// they do is recorded in the enclosing transaction. Returning an error fails
/// the process and rolls its changes back.
pub trait Calculator: Send {
    /// Apply step parameters before [`run`](Calculator::run). Called only for
    /// calculators resolved from the registry.
    fn configure(&mut self, _parameters: &Attributes) -> anyhow::Result<()> {
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()>;
}

/// Calculator backed by a closure.
pub struct FnCalculator<F>(F);

impl<F> FnCalculator<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<()> + Send,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Calculator for FnCalculator<F>
where
    F: FnMut(&mut TaskContext<'_>) -> anyhow::Result<()> + Send,
{
    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        (self.0)(ctx)
    }
}

/// Factory that default-constructs `C`.
pub fn calculator_factory<C>() -> Factory<Box<dyn Calculator>>
where
    C: Calculator + Default + 'static,
{
    Arc::new(|| Box::new(C::default()) as Box<dyn Calculator>)
}

/// What a running step may see and do.
pub struct TaskContext<'a> {
    pub(crate) project: &'a mut Project,
    pub(crate) target: NodeId,
    pub(crate) process: ProcessId,
    pub(crate) step: &'a str,
    pub(crate) warnings: &'a mut Vec<String>,
    pub(crate) events: &'a EventBus,
    pub(crate) cancel: &'a CancelToken,
}

impl<'a> TaskContext<'a> {
    /// Node the enclosing process resolved as its target.
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn target_node(&self) -> Option<&Node> {
        self.project.tree().get(self.target)
    }

    pub fn step_name(&self) -> &str {
        self.step
    }

    pub fn project_name(&self) -> &str {
        self.project.name()
    }

    pub fn tree(&self) -> &ProjectTree {
        self.project.tree()
    }

    pub fn create_node(&self, type_id: &str, name: impl Into<String>) -> Result<Node, RegistryError> {
        self.project.create_node(type_id, name)
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Result<(), TreeError> {
        self.project.set_attribute(id, key, value)
    }

    pub fn remove_attribute(&mut self, id: NodeId, key: &str) -> Result<(), TreeError> {
        self.project.remove_attribute(id, key)
    }

    pub fn rename(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), TreeError> {
        self.project.rename(id, name)
    }

    pub fn append_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, TreeError> {
        self.project.append_child(parent, node)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, node: Node) -> Result<NodeId, TreeError> {
        self.project.insert_child(parent, index, node)
    }

    pub fn remove(&mut self, id: NodeId) -> Result<Node, TreeError> {
        self.project.remove(id)
    }

    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, node: Node) -> Result<NodeId, TreeError> {
        self.project.replace_child(parent, old, node)
    }

    /// Report a non-fatal problem. The process still commits, with status
    /// `FinishedWithWarning`.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(process = %self.process, step = self.step, message = %message, "Process warning");
        self.events.emit(ProcessEvent::Warning {
            id: self.process,
            step: self.step.to_string(),
            message: message.clone(),
        });
        self.warnings.push(message);
    }

    /// Report progress; `fraction` is clamped to `0.0..=1.0`.
    pub fn progress(&self, fraction: f64, message: impl Into<String>) {
        self.events.emit(ProcessEvent::Progress {
            id: self.process,
            step: self.step.to_string(),
            fraction: fraction.clamp(0.0, 1.0),
            message: message.into(),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err` once cancellation was requested; long-running calculators call
    /// this between units of work.
    pub fn check_cancelled(&self) -> anyhow::Result<()> {
        if self.is_cancelled() {
            return Err(ProcessError::Cancelled.into());
        }
        Ok(())
    }
}
