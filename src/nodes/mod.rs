//! The built-in node catalogue.
//!
//! Nodes are registered explicitly; nothing is discovered at load time.
pub mod derived_parameters;
pub mod flight_attributes;
pub mod flight_phases;
pub mod key_point_values;
pub mod key_time_instances;
pub mod library;

use crate::graph::dag::GraphError;
use crate::graph::node::Node;
use crate::store::registry::NodeRegistry;
use std::sync::Arc;

/// Every built-in node, keyed by name.
pub fn builtin_registry() -> Result<NodeRegistry, GraphError> {
    let nodes: Vec<Arc<dyn Node>> = vec![
        // Derived parameters
        Arc::new(derived_parameters::RateOfClimb),
        Arc::new(derived_parameters::AltitudeAal),
        // Sections
        Arc::new(flight_phases::ClimbCruiseDescent),
        Arc::new(flight_phases::Climbing),
        Arc::new(flight_phases::Descending),
        // Key time instances
        Arc::new(key_time_instances::TopOfClimb),
        Arc::new(key_time_instances::TopOfDescent),
        Arc::new(key_time_instances::ClimbStart),
        Arc::new(key_time_instances::FlapStateChanges),
        Arc::new(key_time_instances::GoAround),
        // Key point values
        Arc::new(key_point_values::AltitudeMax),
        Arc::new(key_point_values::RateOfClimbMax),
        // Flight attributes
        Arc::new(flight_attributes::TakeoffDatetime),
    ];

    let mut registry = NodeRegistry::new();
    for node in nodes {
        registry.register(node)?;
    }
    Ok(registry)
}
