//! Structural node types and the general-purpose calculators every Loom
//! installation ships with.

use crate::plugin::{Plugin, Registrar, CALCULATOR_NODE_BASE};
use crate::process::catalog::{PROCESS_DATA_TYPE, TASK_GROUP_TYPE, TASK_TYPE};
use crate::process::{calculator_factory, Calculator, TaskContext};
use crate::project::PROJECT_TYPE;
use crate::registry::TypeDescriptor;
use crate::tree::node_factory;
use crate::types::{AttributeValue, Attributes, NodeId};
use anyhow::{anyhow, bail, Context};
use std::time::Duration;

pub const OBJECT_TYPE: &str = "Object";
pub const FOLDER_TYPE: &str = "Folder";
pub const POINT_TYPE: &str = "Point";

pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        "core"
    }

    fn register(&self, registrar: &mut Registrar) {
        let empty = || node_factory(Attributes::new());
        registrar.register_node_type(TypeDescriptor::new(OBJECT_TYPE, empty()));
        registrar.register_node_type(TypeDescriptor::new(PROJECT_TYPE, empty()).with_base(OBJECT_TYPE));
        registrar.register_node_type(TypeDescriptor::new(FOLDER_TYPE, empty()).with_base(OBJECT_TYPE));
        registrar.register_node_type(TypeDescriptor::new(PROCESS_DATA_TYPE, empty()).with_base(FOLDER_TYPE));
        registrar.register_node_type(TypeDescriptor::new(TASK_GROUP_TYPE, empty()).with_base(FOLDER_TYPE));
        registrar.register_node_type(TypeDescriptor::new(TASK_TYPE, empty()).with_base(OBJECT_TYPE));
        registrar.register_node_type(TypeDescriptor::new(CALCULATOR_NODE_BASE, empty()).with_base(OBJECT_TYPE));

        let mut origin = Attributes::new();
        for axis in ["x", "y", "z"] {
            origin.insert(axis.to_string(), AttributeValue::Float(0.0));
        }
        registrar.register_node_type(TypeDescriptor::new(POINT_TYPE, node_factory(origin)).with_base(OBJECT_TYPE));

        registrar.register_calculator("SetAttribute", calculator_factory::<SetAttribute>());
        registrar.register_calculator("Scale", calculator_factory::<Scale>());
        registrar.register_calculator("CreateChild", calculator_factory::<CreateChild>());
        registrar.register_calculator("RemoveNode", calculator_factory::<RemoveNode>());
        registrar.register_calculator("Warn", calculator_factory::<Warn>());
        registrar.register_calculator("Fail", calculator_factory::<Fail>());
        registrar.register_calculator("Delay", calculator_factory::<Delay>());
    }
}

fn required<'a>(parameters: &'a Attributes, key: &str) -> anyhow::Result<&'a AttributeValue> {
    parameters
        .get(key)
        .ok_or_else(|| anyhow!("missing parameter '{}'", key))
}

fn required_text(parameters: &Attributes, key: &str) -> anyhow::Result<String> {
    required(parameters, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("parameter '{}' must be text", key))
}

fn optional_text(parameters: &Attributes, key: &str) -> Option<String> {
    parameters.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// Resolve an optional `node` path parameter, defaulting to the step target.
fn node_or_target(ctx: &TaskContext<'_>, path: Option<&str>) -> anyhow::Result<NodeId> {
    match path {
        None => Ok(ctx.target()),
        Some(path) => ctx
            .tree()
            .resolve_path(path)
            .ok_or_else(|| anyhow!("node '{}' not found", path)),
    }
}

/// `key = value` on the target, or on the node at path `node`.
#[derive(Default)]
pub struct SetAttribute {
    key: String,
    value: Option<AttributeValue>,
    node: Option<String>,
}

impl Calculator for SetAttribute {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.key = required_text(parameters, "key")?;
        self.value = Some(required(parameters, "value")?.clone());
        self.node = optional_text(parameters, "node");
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let value = self.value.clone().context("SetAttribute was not configured")?;
        let id = node_or_target(ctx, self.node.as_deref())?;
        ctx.set_attribute(id, self.key.clone(), value)?;
        Ok(())
    }
}

/// Multiply a numeric attribute by `factor`. A missing attribute is a warning.
#[derive(Default)]
pub struct Scale {
    key: String,
    factor: f64,
    node: Option<String>,
}

impl Calculator for Scale {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.key = required_text(parameters, "key")?;
        self.factor = required(parameters, "factor")?
            .as_f64()
            .ok_or_else(|| anyhow!("parameter 'factor' must be numeric"))?;
        self.node = optional_text(parameters, "node");
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let id = node_or_target(ctx, self.node.as_deref())?;
        let current = ctx
            .tree()
            .get(id)
            .and_then(|node| node.attribute(&self.key))
            .cloned();
        match current {
            None => {
                let path = ctx.tree().path_of(id)?;
                ctx.warn(format!("{} has no attribute '{}', nothing scaled", path, self.key));
                Ok(())
            }
            Some(value) => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| anyhow!("attribute '{}' is not numeric", self.key))?;
                let scaled = number * self.factor;
                if !scaled.is_finite() {
                    bail!("scaling '{}' by {} overflows", self.key, self.factor);
                }
                ctx.set_attribute(id, self.key.clone(), scaled)?;
                Ok(())
            }
        }
    }
}

/// Create a node of `type` named `name` under the target.
#[derive(Default)]
pub struct CreateChild {
    type_id: String,
    name: String,
}

impl Calculator for CreateChild {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.type_id = required_text(parameters, "type")?;
        self.name = required_text(parameters, "name")?;
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let node = ctx.create_node(&self.type_id, self.name.clone())?;
        let target = ctx.target();
        ctx.append_child(target, node)?;
        Ok(())
    }
}

/// Remove the node at path `node`.
#[derive(Default)]
pub struct RemoveNode {
    node: String,
}

impl Calculator for RemoveNode {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.node = required_text(parameters, "node")?;
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let id = node_or_target(ctx, Some(self.node.as_str()))?;
        ctx.remove(id)?;
        Ok(())
    }
}

/// Report `message` as a warning.
#[derive(Default)]
pub struct Warn {
    message: String,
}

impl Calculator for Warn {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.message = optional_text(parameters, "message").unwrap_or_else(|| "warning".to_string());
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        ctx.warn(self.message.clone());
        Ok(())
    }
}

/// Fail with `message`.
#[derive(Default)]
pub struct Fail {
    message: String,
}

impl Calculator for Fail {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.message = optional_text(parameters, "message").unwrap_or_else(|| "failed".to_string());
        Ok(())
    }

    fn run(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        bail!("{}", self.message)
    }
}

/// Wait `millis` milliseconds, checking for cancellation as it goes.
#[derive(Default)]
pub struct Delay {
    millis: u64,
}

const DELAY_SLICE: Duration = Duration::from_millis(10);

impl Calculator for Delay {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.millis = match required(parameters, "millis")? {
            AttributeValue::Int(ms) if *ms >= 0 => *ms as u64,
            _ => bail!("parameter 'millis' must be a non-negative integer"),
        };
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let total = Duration::from_millis(self.millis);
        let mut waited = Duration::ZERO;
        while waited < total {
            ctx.check_cancelled()?;
            let slice = DELAY_SLICE.min(total - waited);
            std::thread::sleep(slice);
            waited += slice;
            ctx.progress(waited.as_secs_f64() / total.as_secs_f64(), "waiting");
        }
        Ok(())
    }
}
