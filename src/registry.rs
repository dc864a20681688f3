//! Type Registry
//!
//! Maps stable type identifiers to factories. Plugins populate a registry during
//! startup; afterwards it is shared behind an `Arc` and read concurrently by the
//! project loader, the command history and the process executor.
//!
//! The registry is generic over what the factories produce. Loom keeps two
//! instances: one for data-model nodes (see [`crate::tree::NodeRegistry`]) and
//! one for calculators (see [`crate::process::CalculatorRegistry`]).

use crate::error::RegistryError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared constructor closure for one registered type.
pub type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// A type identifier bound to its factory.
pub struct TypeDescriptor<T> {
    type_id: String,
    base_type: Option<String>,
    factory: Factory<T>,
}

impl<T> TypeDescriptor<T> {
    pub fn new(type_id: impl Into<String>, factory: Factory<T>) -> Self {
        Self {
            type_id: type_id.into(),
            base_type: None,
            factory,
        }
    }

    /// Declare the type this one specializes.
    pub fn with_base(mut self, base_type: impl Into<String>) -> Self {
        self.base_type = Some(base_type.into());
        self
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn base_type(&self) -> Option<&str> {
        self.base_type.as_deref()
    }

    /// Same identifier, same factory instance, same base type.
    fn same_binding(&self, other: &TypeDescriptor<T>) -> bool {
        self.type_id == other.type_id
            && self.base_type == other.base_type
            && Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl<T> Clone for TypeDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id.clone(),
            base_type: self.base_type.clone(),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<T> std::fmt::Debug for TypeDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_id", &self.type_id)
            .field("base_type", &self.base_type)
            .finish_non_exhaustive()
    }
}

struct RegistryInner<T> {
    order: Vec<String>,
    types: HashMap<String, TypeDescriptor<T>>,
}

/// Registry of type identifiers to factories.
///
/// Lookups take a shared lock; registration takes a short exclusive lock. The
/// factory itself is always invoked after the lock is released.
pub struct TypeRegistry<T> {
    kind: &'static str,
    inner: RwLock<RegistryInner<T>>,
}

impl<T> TypeRegistry<T> {
    /// Create an empty registry. `kind` names the registry in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            inner: RwLock::new(RegistryInner {
                order: Vec::new(),
                types: HashMap::new(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Register a descriptor.
    ///
    /// Returns `Ok(true)` when the type was added and `Ok(false)` when the exact
    /// same binding was already present.
    pub fn register(&self, descriptor: TypeDescriptor<T>) -> Result<bool, RegistryError> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.types.get(descriptor.type_id()) {
            if existing.same_binding(&descriptor) {
                debug!(registry = self.kind, type_id = %descriptor.type_id(), "Type already registered");
                return Ok(false);
            }
            warn!(registry = self.kind, type_id = %descriptor.type_id(), "Conflicting type registration rejected");
            return Err(RegistryError::DuplicateType {
                registry: self.kind,
                type_id: descriptor.type_id.clone(),
            });
        }

        debug!(registry = self.kind, type_id = %descriptor.type_id(), "Type registered");
        inner.order.push(descriptor.type_id.clone());
        inner.types.insert(descriptor.type_id.clone(), descriptor);
        Ok(true)
    }

    /// Shorthand for registering a bare factory without a base type.
    pub fn register_factory(
        &self,
        type_id: impl Into<String>,
        factory: Factory<T>,
    ) -> Result<bool, RegistryError> {
        self.register(TypeDescriptor::new(type_id, factory))
    }

    /// Register several descriptors at once.
    ///
    /// Either all new descriptors are added or none are: a conflict with an
    /// existing binding, or two different bindings for one identifier inside
    /// the batch, rejects the whole batch.
    pub fn register_all(
        &self,
        descriptors: Vec<TypeDescriptor<T>>,
    ) -> Result<usize, RegistryError> {
        let mut inner = self.inner.write();
        self.check_batch(&inner, &descriptors)?;

        let mut added = 0usize;
        for descriptor in descriptors {
            if inner.types.contains_key(descriptor.type_id()) {
                continue;
            }
            inner.order.push(descriptor.type_id.clone());
            inner.types.insert(descriptor.type_id.clone(), descriptor);
            added += 1;
        }
        debug!(registry = self.kind, added, "Batch registered");
        Ok(added)
    }

    /// Whether [`register_all`](Self::register_all) would accept
    /// `descriptors` right now. Registers nothing.
    pub fn check_all(&self, descriptors: &[TypeDescriptor<T>]) -> Result<(), RegistryError> {
        let inner = self.inner.read();
        self.check_batch(&inner, descriptors)
    }

    fn check_batch(
        &self,
        inner: &RegistryInner<T>,
        descriptors: &[TypeDescriptor<T>],
    ) -> Result<(), RegistryError> {
        let mut batch: HashMap<&str, &TypeDescriptor<T>> = HashMap::new();
        for descriptor in descriptors {
            let conflicts_existing = inner
                .types
                .get(descriptor.type_id())
                .is_some_and(|existing| !existing.same_binding(descriptor));
            let conflicts_batch = batch
                .get(descriptor.type_id())
                .is_some_and(|earlier| !earlier.same_binding(descriptor));
            if conflicts_existing || conflicts_batch {
                warn!(registry = self.kind, type_id = %descriptor.type_id(), "Batch registration rejected");
                return Err(RegistryError::DuplicateType {
                    registry: self.kind,
                    type_id: descriptor.type_id.clone(),
                });
            }
            batch.insert(descriptor.type_id(), descriptor);
        }
        Ok(())
    }

    /// Construct a fresh default instance of `type_id`.
    pub fn create(&self, type_id: &str) -> Result<T, RegistryError> {
        let factory = {
            let inner = self.inner.read();
            inner
                .types
                .get(type_id)
                .map(|descriptor| Arc::clone(&descriptor.factory))
        };
        match factory {
            Some(factory) => Ok(factory()),
            None => Err(RegistryError::UnknownType {
                registry: self.kind,
                type_id: type_id.to_string(),
            }),
        }
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.inner.read().types.contains_key(type_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered descriptor for `type_id`, if any.
    pub fn descriptor(&self, type_id: &str) -> Option<TypeDescriptor<T>> {
        self.inner.read().types.get(type_id).cloned()
    }

    pub fn base_type(&self, type_id: &str) -> Option<String> {
        self.inner
            .read()
            .types
            .get(type_id)
            .and_then(|descriptor| descriptor.base_type.clone())
    }

    /// `type_id` followed by its registered base types, nearest first.
    ///
    /// Empty when `type_id` is unknown. The walk stops at the first base type
    /// that is not registered and never visits a type twice.
    pub fn type_hierarchy(&self, type_id: &str) -> Vec<String> {
        let inner = self.inner.read();
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = inner.types.get(type_id);
        while let Some(descriptor) = current {
            if !seen.insert(descriptor.type_id.as_str()) {
                break;
            }
            chain.push(descriptor.type_id.clone());
            current = descriptor
                .base_type
                .as_deref()
                .and_then(|base| inner.types.get(base));
        }
        chain
    }

    /// Whether `type_id` is `ancestor` or specializes it.
    pub fn is_a(&self, type_id: &str, ancestor: &str) -> bool {
        self.type_hierarchy(type_id).iter().any(|t| t == ancestor)
    }

    /// Registered identifiers in registration order.
    ///
    /// The returned iterator walks a snapshot taken now; clone it to restart.
    pub fn list_types(&self) -> TypeIds {
        let inner = self.inner.read();
        TypeIds {
            ids: inner.order.iter().cloned().collect(),
            pos: 0,
        }
    }
}

/// Restartable iterator over registered type identifiers.
#[derive(Debug, Clone)]
pub struct TypeIds {
    ids: Arc<[String]>,
    pos: usize,
}

impl Iterator for TypeIds {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.ids.get(self.pos)?.clone();
        self.pos += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ids.len() - self.pos;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TypeIds {}
