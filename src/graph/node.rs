//! Defines the `Node` contract and the values that flow between nodes.
//!
//! A node is a stateless template: it declares its dependencies statically and
//! derives a result from the values the engine resolves for them. The engine
//! supplies the computation [`Frame`] chosen for the run, so no per-flight
//! state lives on the node itself.

use crate::store::types::{
    Attribute, Frame, KeyPointValue, KeyTimeInstance, MaskedArray, NodeKind, Parameter, Section,
};
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A declared input of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub name: Cow<'static, str>,
    /// Optional inputs do not block the default `can_operate` check.
    pub optional: bool,
}

impl Dependency {
    pub const fn required(name: &'static str) -> Self {
        Self { name: Cow::Borrowed(name), optional: false }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name: Cow::Borrowed(name), optional: true }
    }

    /// A dependency with a runtime-built name.
    pub fn named(name: impl Into<String>, optional: bool) -> Self {
        Self { name: Cow::Owned(name.into()), optional }
    }
}

/// The computation unit plugged into the engine.
pub trait Node: Send + Sync {
    /// Unique name; also the name dependents use to refer to the result.
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Declared inputs, in the order `derive` expects them.
    fn dependencies(&self) -> &[Dependency];

    /// Whether the node can run given the names resolvable in this flight.
    fn can_operate(&self, available: &BTreeSet<&str>) -> bool {
        self.dependencies()
            .iter()
            .filter(|d| !d.optional)
            .all(|d| available.contains(d.name.as_ref()))
    }

    fn derive(&self, frame: Frame, deps: &Dependencies) -> Result<NodeOutput, NodeError>;
}

impl fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node").field("name", &self.name()).field("kind", &self.kind()).finish()
    }
}

/// Dependency names of a node in declared order.
pub fn dependency_names(node: &dyn Node) -> Vec<String> {
    node.dependencies().iter().map(|d| d.name.to_string()).collect()
}

// --- Values ---

/// A list of items produced by a list node, tagged with the frame of its indices.
#[derive(Debug, Clone, PartialEq)]
pub struct Indexed<T> {
    pub frame: Frame,
    pub items: Arc<Vec<T>>,
}

impl<T> Indexed<T> {
    pub fn new(frame: Frame, items: Vec<T>) -> Self {
        Self { frame, items: Arc::new(items) }
    }
}

/// A resolved dependency value or a stored node result.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Parameter(Arc<Parameter>),
    Sections(Indexed<Section>),
    KeyTimeInstances(Indexed<KeyTimeInstance>),
    KeyPointValues(Indexed<KeyPointValue>),
    Attribute(Arc<Attribute>),
}

impl NodeValue {
    /// The time frame of the value; attributes have none.
    pub fn frame(&self) -> Option<Frame> {
        match self {
            NodeValue::Parameter(p) => Some(p.frame()),
            NodeValue::Sections(s) => Some(s.frame),
            NodeValue::KeyTimeInstances(k) => Some(k.frame),
            NodeValue::KeyPointValues(k) => Some(k.frame),
            NodeValue::Attribute(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeValue::Parameter(_) => "parameter",
            NodeValue::Sections(_) => "sections",
            NodeValue::KeyTimeInstances(_) => "key time instances",
            NodeValue::KeyPointValues(_) => "key point values",
            NodeValue::Attribute(_) => "attribute",
        }
    }
}

/// Resolved inputs for one derivation, in declared order. Absent inputs are `None`.
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    entries: SmallVec<[(String, Option<NodeValue>); 6]>,
}

impl Dependencies {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, name: impl Into<String>, value: Option<NodeValue>) {
        self.entries.push((name.into(), value));
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&NodeValue>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    pub fn get(&self, name: &str) -> Option<&NodeValue> {
        self.entries.iter().find(|(n, _)| n == name).and_then(|(_, v)| v.as_ref())
    }

    pub fn all_absent(&self) -> bool {
        self.entries.iter().all(|(_, v)| v.is_none())
    }

    pub fn available_names(&self) -> BTreeSet<&str> {
        self.entries.iter().filter(|(_, v)| v.is_some()).map(|(n, _)| n.as_str()).collect()
    }

    pub(crate) fn map_values(self, mut f: impl FnMut(NodeValue) -> NodeValue) -> Self {
        let entries = self.entries.into_iter().map(|(n, v)| (n, v.map(&mut f))).collect();
        Self { entries }
    }

    fn require(&self, name: &str) -> Result<&NodeValue, NodeError> {
        self.get(name).ok_or_else(|| NodeError::MissingDependency(name.to_string()))
    }

    fn wrong_kind(name: &str, expected: &'static str, found: &NodeValue) -> NodeError {
        NodeError::WrongKind { name: name.to_string(), expected, found: found.label() }
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, NodeError> {
        match self.require(name)? {
            NodeValue::Parameter(p) => Ok(p),
            other => Err(Self::wrong_kind(name, "parameter", other)),
        }
    }

    /// Like [`Dependencies::parameter`] but an absent input is `Ok(None)`.
    pub fn optional_parameter(&self, name: &str) -> Result<Option<&Parameter>, NodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(_) => self.parameter(name).map(Some),
        }
    }

    pub fn sections(&self, name: &str) -> Result<&[Section], NodeError> {
        match self.require(name)? {
            NodeValue::Sections(s) => Ok(&s.items),
            other => Err(Self::wrong_kind(name, "sections", other)),
        }
    }

    pub fn key_time_instances(&self, name: &str) -> Result<&[KeyTimeInstance], NodeError> {
        match self.require(name)? {
            NodeValue::KeyTimeInstances(k) => Ok(&k.items),
            other => Err(Self::wrong_kind(name, "key time instances", other)),
        }
    }

    pub fn key_point_values(&self, name: &str) -> Result<&[KeyPointValue], NodeError> {
        match self.require(name)? {
            NodeValue::KeyPointValues(k) => Ok(&k.items),
            other => Err(Self::wrong_kind(name, "key point values", other)),
        }
    }

    pub fn attribute(&self, name: &str) -> Result<&Attribute, NodeError> {
        match self.require(name)? {
            NodeValue::Attribute(a) => Ok(a),
            other => Err(Self::wrong_kind(name, "attribute", other)),
        }
    }
}

// --- Results ---

/// What a single derivation produced. Indices are in the node's frame.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// `array == None` means the node could not produce any valid samples.
    Parameter { array: Option<MaskedArray>, frame: Frame },
    Sections(Vec<Section>),
    KeyTimeInstances(Vec<KeyTimeInstance>),
    KeyPointValues(Vec<KeyPointValue>),
    /// `None` is the recoverable "returned empty handed" case.
    FlightAttribute(Option<Attribute>),
}

impl NodeOutput {
    /// The node kind this output belongs to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeOutput::Parameter { .. } => NodeKind::DerivedParameter,
            NodeOutput::Sections(_) => NodeKind::Section,
            NodeOutput::KeyTimeInstances(_) => NodeKind::KeyTimeInstance,
            NodeOutput::KeyPointValues(_) => NodeKind::KeyPointValue,
            NodeOutput::FlightAttribute(_) => NodeKind::FlightAttribute,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Required dependency '{0}' is not available")]
    MissingDependency(String),
    #[error("Dependency '{name}' expected to be {expected}, found {found}")]
    WrongKind { name: String, expected: &'static str, found: &'static str },
    #[error("{0}")]
    Domain(String),
}
