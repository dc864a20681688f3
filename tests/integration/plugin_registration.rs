//! Plugins extending the registries

use loom::plugin::{Plugin, Registrar, Registries};
use loom::process::{calculator_factory, Calculator, Process, ProcessExecutor, ProcessStatus, TaskContext};
use loom::registry::TypeDescriptor;
use loom::tree::node_factory;
use loom::types::{AttributeValue, Attributes};

use crate::integration::test_utils::project;

/// Adds a `Beam` node type and a `Tag` calculator.
struct StructuralPlugin;

#[derive(Default)]
struct Tag {
    value: String,
}

impl Calculator for Tag {
    fn configure(&mut self, parameters: &Attributes) -> anyhow::Result<()> {
        self.value = parameters
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or("tagged")
            .to_string();
        Ok(())
    }

    fn run(&mut self, ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
        let target = ctx.target();
        ctx.set_attribute(target, "tag", self.value.clone())?;
        Ok(())
    }
}

impl Plugin for StructuralPlugin {
    fn name(&self) -> &str {
        "structural"
    }

    fn register(&self, registrar: &mut Registrar) {
        let mut defaults = Attributes::new();
        defaults.insert("length".to_string(), AttributeValue::Float(1.0));
        registrar.register_node_type(TypeDescriptor::new("Beam", node_factory(defaults)).with_base("Object"));
        registrar.register_calculator("Tag", calculator_factory::<Tag>());
    }
}

#[test]
fn plugin_types_are_usable_by_processes() {
    let registries = Registries::with_core().unwrap();
    assert_eq!(registries.install(&StructuralPlugin).unwrap(), 3);
    assert!(registries.nodes.is_a("Beam", "Object"));
    assert!(registries.nodes.is_a("Tag", "Calculator"));

    let beam = registries.nodes.create_node("Beam", "B1").unwrap();
    assert_eq!(beam.attribute("length"), Some(&AttributeValue::Float(1.0)));

    let mut project = project(&registries, "bridge");
    let mut executor = ProcessExecutor::new(registries.calculators.clone());
    let mut params = Attributes::new();
    params.insert("value".to_string(), "checked".into());
    executor.submit(Process::new("tag root").deferred("Tag", params));
    let summary = executor.run(&mut project);
    assert_eq!(summary.reports[0].status, ProcessStatus::Finished);
    assert_eq!(
        project.tree().root().attribute("tag"),
        Some(&AttributeValue::from("checked"))
    );
}

#[test]
fn installing_twice_is_a_no_op() {
    let registries = Registries::with_core().unwrap();
    registries.install(&StructuralPlugin).unwrap();
    let before: Vec<String> = registries.nodes.list_types().collect();
    assert_eq!(registries.install(&StructuralPlugin).unwrap(), 0);
    let clone = registries.clone();
    assert_eq!(clone.install(&StructuralPlugin).unwrap(), 0);
    let after: Vec<String> = registries.nodes.list_types().collect();
    assert_eq!(before, after);
}

#[test]
fn type_listing_is_restartable() {
    let registries = Registries::with_core().unwrap();
    let listing = registries.nodes.list_types();
    let first: Vec<String> = listing.clone().collect();
    let second: Vec<String> = listing.collect();
    assert_eq!(first, second);
    assert_eq!(first[0], "Object");
}
