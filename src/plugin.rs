//! Plugin registration hook.
//!
//! Plugins contribute node types and calculator types during startup. Each
//! plugin fills a [`Registrar`]; [`Registries::install`] checks both batches
//! before registering either, so a conflicting plugin adds nothing. A plugin
//! name is installed at most once per set of registries.

pub mod builtin;

pub use self::builtin::CorePlugin;

use crate::error::RegistryError;
use crate::process::{Calculator, CalculatorRegistry};
use crate::registry::{Factory, TypeDescriptor};
use crate::tree::{node_factory, Node, NodeRegistry};
use crate::types::Attributes;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Base node type of every calculator step node.
pub const CALCULATOR_NODE_BASE: &str = "Calculator";

/// Node factory shared by every calculator step type.
fn calculator_node_factory() -> Factory<Node> {
    static FACTORY: OnceLock<Factory<Node>> = OnceLock::new();
    FACTORY.get_or_init(|| node_factory(Attributes::new())).clone()
}

/// A set of types contributed at startup.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, registrar: &mut Registrar);
}

/// Collects one plugin's registrations.
#[derive(Default)]
pub struct Registrar {
    nodes: Vec<TypeDescriptor<Node>>,
    calculators: Vec<TypeDescriptor<Box<dyn Calculator>>>,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_node_type(&mut self, descriptor: TypeDescriptor<Node>) {
        self.nodes.push(descriptor);
    }

    /// Register a calculator. A node type of the same id (based on
    /// [`CALCULATOR_NODE_BASE`]) is registered with it so stored process
    /// steps of this type can be loaded.
    pub fn register_calculator(&mut self, type_id: &str, factory: Factory<Box<dyn Calculator>>) {
        self.calculators.push(TypeDescriptor::new(type_id, factory));
        self.nodes.push(
            TypeDescriptor::new(type_id, calculator_node_factory()).with_base(CALCULATOR_NODE_BASE),
        );
    }
}

/// The two registries shared by the rest of the system.
#[derive(Clone)]
pub struct Registries {
    pub nodes: Arc<NodeRegistry>,
    pub calculators: Arc<CalculatorRegistry>,
    installed: Arc<Mutex<BTreeSet<String>>>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(NodeRegistry::new("node")),
            calculators: Arc::new(CalculatorRegistry::new("calculator")),
            installed: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Registries with [`CorePlugin`] installed.
    pub fn with_core() -> Result<Self, RegistryError> {
        let registries = Self::new();
        registries.install(&CorePlugin)?;
        Ok(registries)
    }

    /// Register everything `plugin` contributes. Returns the number of new
    /// types; installing an already installed plugin returns 0.
    pub fn install(&self, plugin: &dyn Plugin) -> Result<usize, RegistryError> {
        let mut installed = self.installed.lock();
        if installed.contains(plugin.name()) {
            debug!(plugin = plugin.name(), "Plugin already installed");
            return Ok(0);
        }
        let mut registrar = Registrar::new();
        plugin.register(&mut registrar);
        self.nodes.check_all(&registrar.nodes)?;
        self.calculators.check_all(&registrar.calculators)?;
        let nodes = self.nodes.register_all(registrar.nodes)?;
        let calculators = self.calculators.register_all(registrar.calculators)?;
        installed.insert(plugin.name().to_string());
        info!(plugin = plugin.name(), nodes, calculators, "Plugin installed");
        Ok(nodes + calculators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::calculator_factory;
    use crate::process::TaskContext;

    #[derive(Default)]
    struct Noop;

    impl Calculator for Noop {
        fn run(&mut self, _ctx: &mut TaskContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct Extra;

    impl Plugin for Extra {
        fn name(&self) -> &str {
            "extra"
        }

        fn register(&self, registrar: &mut Registrar) {
            registrar.register_node_type(TypeDescriptor::new("Beam", node_factory(Attributes::new())));
            registrar.register_calculator("Noop", calculator_factory::<Noop>());
        }
    }

    struct Clashing;

    impl Plugin for Clashing {
        fn name(&self) -> &str {
            "clashing"
        }

        fn register(&self, registrar: &mut Registrar) {
            registrar.register_node_type(TypeDescriptor::new("Girder", node_factory(Attributes::new())));
            registrar.register_node_type(TypeDescriptor::new("Task", node_factory(Attributes::new())));
        }
    }

    struct CalculatorClash;

    impl Plugin for CalculatorClash {
        fn name(&self) -> &str {
            "calculator-clash"
        }

        fn register(&self, registrar: &mut Registrar) {
            registrar.register_node_type(TypeDescriptor::new("Truss", node_factory(Attributes::new())));
            registrar.register_calculator("Fresh", calculator_factory::<Noop>());
            registrar.register_calculator("Noop", calculator_factory::<Noop>());
        }
    }

    #[test]
    fn calculator_conflict_leaves_node_types_unregistered() {
        let registries = Registries::with_core().unwrap();
        registries.install(&Extra).unwrap();
        let nodes_before = registries.nodes.len();
        let err = registries.install(&CalculatorClash).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { registry: "calculator", ref type_id } if type_id == "Noop"));
        assert_eq!(registries.nodes.len(), nodes_before);
        assert!(!registries.nodes.contains("Truss"));
        assert!(!registries.nodes.contains("Fresh"));
        assert!(!registries.calculators.contains("Fresh"));
    }

    #[test]
    fn installing_twice_adds_nothing() {
        let registries = Registries::with_core().unwrap();
        assert_eq!(registries.install(&Extra).unwrap(), 3);
        assert_eq!(registries.install(&Extra).unwrap(), 0);
        assert_eq!(registries.install(&CorePlugin).unwrap(), 0);
        assert!(registries.calculators.contains("Noop"));
    }

    #[test]
    fn calculators_bring_their_node_type() {
        let registries = Registries::with_core().unwrap();
        registries.install(&Extra).unwrap();
        assert!(registries.nodes.contains("Beam"));
        assert!(registries.calculators.contains("Noop"));
        assert!(registries.nodes.is_a("Noop", CALCULATOR_NODE_BASE));
    }

    #[test]
    fn conflicting_plugin_adds_nothing() {
        let registries = Registries::with_core().unwrap();
        let before = registries.nodes.len();
        let err = registries.install(&Clashing).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateType { ref type_id, .. } if type_id == "Task"));
        assert_eq!(registries.nodes.len(), before);
        assert!(!registries.nodes.contains("Girder"));
    }
}
