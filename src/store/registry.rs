use super::aircraft::{AchievedFlightRecord, AircraftInfo};
use super::types::{Attribute, NodeKind};
use crate::graph::dag::GraphError;
use crate::graph::node::Node;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Name-indexed catalogue of the node implementations available to a run.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Arc<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self { Self::default() }

    /// Adds a node. Names must be unique across the catalogue.
    pub fn register(&mut self, node: Arc<dyn Node>) -> Result<(), GraphError> {
        let name = node.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.insert(name, node);
        Ok(())
    }

    pub fn with(mut self, node: impl Node + 'static) -> Result<Self, GraphError> {
        self.register(Arc::new(node))?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Node names in lexical order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn names_of_kind(&self, kind: NodeKind) -> Vec<String> {
        self.nodes.values().filter(|n| n.kind() == kind).map(|n| n.name().to_string()).collect()
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
}

/// How a dependency name is satisfied in a given flight.
#[derive(Debug, Clone)]
pub enum Classification {
    RawChannel,
    Attribute,
    Derivable(Arc<dyn Node>),
    Unavailable,
}

impl Classification {
    pub fn is_available_leaf(&self) -> bool {
        matches!(self, Classification::RawChannel | Classification::Attribute)
    }
}

/// Per-run view of what exists for one flight.
///
/// Built once per flight-processing invocation and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct NodeManager {
    pub start_datetime: DateTime<Utc>,
    raw_channels: BTreeSet<String>,
    attributes: BTreeMap<String, Attribute>,
    registry: NodeRegistry,
    required: Vec<String>,
}

impl NodeManager {
    pub fn new(
        start_datetime: DateTime<Utc>,
        raw_channels: BTreeSet<String>,
        required: Vec<String>,
        registry: NodeRegistry,
        aircraft_info: &AircraftInfo,
        achieved_flight_record: &AchievedFlightRecord,
    ) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "Start Datetime".to_string(),
            Attribute::new("Start Datetime", start_datetime.to_rfc3339()),
        );
        for (name, value) in achieved_flight_record {
            attributes.insert(name.clone(), Attribute::new(name.clone(), value.clone()));
        }
        for attr in aircraft_info.attributes() {
            attributes.insert(attr.name.clone(), attr);
        }

        Self { start_datetime, raw_channels, attributes, registry, required }
    }

    /// Raw channels take precedence over attributes, which take precedence
    /// over derivable nodes.
    pub fn classify(&self, name: &str) -> Classification {
        if self.raw_channels.contains(name) {
            Classification::RawChannel
        } else if self.attributes.contains_key(name) {
            Classification::Attribute
        } else if let Some(node) = self.registry.get(name) {
            Classification::Derivable(node.clone())
        } else {
            Classification::Unavailable
        }
    }

    pub fn is_raw_channel(&self, name: &str) -> bool {
        self.raw_channels.contains(name)
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn derived_node(&self, name: &str) -> Option<&Arc<dyn Node>> {
        self.registry.get(name)
    }

    pub fn registry(&self) -> &NodeRegistry { &self.registry }
    pub fn required(&self) -> &[String] { &self.required }
}
