//! Core identifier and value types shared across the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable node identifier.
///
/// Persisted with the node, so a node keeps its identity across save/load and
/// mementos can target it after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(NodeId)
    }
}

/// A single node attribute value.
///
/// Serialized untagged, so `{"mass": 2.5, "label": "rotor"}` reads naturally in
/// project files. Integers and floats stay distinct: `1` is an `Int`, `1.0` a
/// `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// False only for NaN and infinite floats, which JSON cannot carry.
    pub fn is_finite(&self) -> bool {
        match self {
            AttributeValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Parse a command-line style literal: `true`/`false`, integers, floats,
    /// anything else is text.
    pub fn parse_literal(raw: &str) -> Self {
        if let Ok(b) = raw.parse::<bool>() {
            return AttributeValue::Bool(b);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return AttributeValue::Int(i);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => AttributeValue::Float(f),
            _ => AttributeValue::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

/// Ordered attribute map; ordering keeps serialization deterministic.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Identifier assigned to each submitted process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(u64);

impl ProcessId {
    pub fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ProcessId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
