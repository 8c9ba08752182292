use crate::graph::dag::DependencyGraph;
use crate::store::registry::{Classification, NodeManager};
use crate::store::types::NodeKind;

/// Concrete channels consumed by more than `threshold` nodes in the graph.
///
/// Only raw channels and derived parameters qualify; list kinds and
/// attributes never live in storage. A threshold of 0 disables the policy.
pub fn cache_candidates(graph: &DependencyGraph, manager: &NodeManager, threshold: usize) -> Vec<String> {
    if threshold == 0 {
        return Vec::new();
    }
    let mut names: Vec<String> = graph
        .node_names()
        .filter(|name| is_concrete_channel(manager, name))
        .filter(|name| graph.dependents_count(name) > threshold)
        .map(str::to_string)
        .collect();
    names.sort();
    tracing::debug!(channels = ?names, threshold, "Channels marked for caching");
    names
}

fn is_concrete_channel(manager: &NodeManager, name: &str) -> bool {
    match manager.classify(name) {
        Classification::RawChannel => true,
        Classification::Derivable(node) => node.kind() == NodeKind::DerivedParameter,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::{Dependencies, Dependency, Node, NodeError, NodeOutput};
    use crate::store::aircraft::{AchievedFlightRecord, AircraftInfo};
    use crate::store::registry::NodeRegistry;
    use crate::store::types::Frame;
    use chrono::Utc;
    use rstest::rstest;
    use std::sync::Arc;

    struct Consumer {
        name: String,
        kind: NodeKind,
        deps: Vec<Dependency>,
    }

    impl Node for Consumer {
        fn name(&self) -> &str { &self.name }
        fn kind(&self) -> NodeKind { self.kind }
        fn dependencies(&self) -> &[Dependency] { &self.deps }
        fn derive(&self, _frame: Frame, _deps: &Dependencies) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::KeyPointValues(vec![]))
        }
    }

    fn consumer(name: &str, kind: NodeKind, deps: &[&str]) -> Consumer {
        Consumer { name: name.into(), kind, deps: deps.iter().map(|d| Dependency::named(*d, false)).collect() }
    }

    /// "Heavy" (raw) and "Derived" feed four nodes each, "Light" feeds two,
    /// "Phase" is a section consumed four times.
    fn fixture() -> (DependencyGraph, NodeManager) {
        let mut registry = NodeRegistry::new();
        registry.register(Arc::new(consumer("Derived", NodeKind::DerivedParameter, &["Light"]))).unwrap();
        registry.register(Arc::new(consumer("Phase", NodeKind::Section, &["Light"]))).unwrap();
        for i in 0..4 {
            registry
                .register(Arc::new(consumer(&format!("KPV {}", i), NodeKind::KeyPointValue, &["Heavy", "Derived", "Phase"])))
                .unwrap();
        }
        let required: Vec<String> = (0..4).map(|i| format!("KPV {}", i)).collect();
        let manager = NodeManager::new(
            Utc::now(),
            ["Heavy", "Light"].iter().map(|s| s.to_string()).collect(),
            required,
            registry,
            &AircraftInfo::with_tail_number("G-ABCD"),
            &AchievedFlightRecord::new(),
        );
        let graph = DependencyGraph::build(&manager, &[]).unwrap();
        (graph, manager)
    }

    #[rstest]
    #[case(3, vec!["Derived", "Heavy"])]
    #[case(4, vec![])]
    #[case(1, vec!["Derived", "Heavy", "Light"])]
    #[case(0, vec![])]
    fn test_cache_threshold(#[case] threshold: usize, #[case] expected: Vec<&str>) {
        let (graph, manager) = fixture();
        assert_eq!(graph.dependents_count("Light"), 2);
        assert_eq!(cache_candidates(&graph, &manager, threshold), expected);
    }

    #[test]
    fn test_sections_are_never_cached() {
        let (graph, manager) = fixture();
        assert_eq!(graph.dependents_count("Phase"), 4);
        assert!(!cache_candidates(&graph, &manager, 1).contains(&"Phase".to_string()));
    }
}
