//! ledger.rs
//! Results accumulated during one flight's run.

use crate::graph::node::NodeValue;
use crate::store::types::{Attribute, KeyPointValue, KeyTimeInstance, Section};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Owned by the engine for the duration of a run.
///
/// `values` holds node results that later nodes may consume; the output
/// collections are append-only and hold 1 Hz aligned items.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    values: HashMap<String, NodeValue>,
    pub flight_attributes: Vec<Attribute>,
    pub key_time_instances: Vec<KeyTimeInstance>,
    pub key_point_values: Vec<KeyPointValue>,
    pub sections: Vec<Section>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&NodeValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: NodeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Hands the output collections to the caller.
    pub fn into_results(self) -> FlightResults {
        FlightResults {
            flight_attributes: self.flight_attributes,
            key_time_instances: self.key_time_instances,
            key_point_values: self.key_point_values,
            sections: self.sections,
        }
    }
}

/// The immutable snapshot returned from a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightResults {
    pub flight_attributes: Vec<Attribute>,
    pub key_time_instances: Vec<KeyTimeInstance>,
    pub key_point_values: Vec<KeyPointValue>,
    pub sections: Vec<Section>,
}

impl FlightResults {
    pub fn key_time_instances_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a KeyTimeInstance> + 'a {
        self.key_time_instances.iter().filter(move |k| k.name == name)
    }

    pub fn key_point_values_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a KeyPointValue> + 'a {
        self.key_point_values.iter().filter(move |k| k.name == name)
    }

    pub fn sections_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.name == name)
    }

    pub fn flight_attribute(&self, name: &str) -> Option<&Attribute> {
        self.flight_attributes.iter().find(|a| a.name == name)
    }
}
