//! dag.rs
//! Builds the per-flight dependency graph and its processing order.
//!
//! Edges point from a dependent to each of its dependencies. The closure is
//! collected from the target names, availability is resolved bottom-up while
//! the order is produced, and nodes that cannot operate for this flight are
//! dropped from both the order and the graph.

use crate::store::registry::{Classification, NodeManager};
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Node '{0}' not found: it is not a recorded channel, an attribute or a derivable node")]
    NodeNotFound(String),
    #[error("Cycle detected in dependency graph involving: {}", .0.join(", "))]
    CycleDetected(Vec<String>),
    #[error("No dependencies available - nodes cannot operate without ANY dependencies available! Node: {0}")]
    NoDependenciesAvailable(String),
    #[error("Node '{0}' is registered more than once")]
    DuplicateNode(String),
}

/// Adjacency export: node name -> names of its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree(pub BTreeMap<String, Vec<String>>);

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<String, ()>,
    indices: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph for `manager.required()` plus `lenient_targets`.
    ///
    /// Required targets must be classifiable and their closure must not hold a
    /// node whose dependencies are all unavailable. Lenient targets (and their
    /// closure) are silently excluded in the same situations.
    pub fn build(manager: &NodeManager, lenient_targets: &[String]) -> Result<Self, GraphError> {
        let mut builder = Builder { manager, dg: DependencyGraph::default(), strict: HashSet::new(), dead: HashSet::new() };

        for name in manager.required() {
            if let Classification::Unavailable = manager.classify(name) {
                return Err(GraphError::NodeNotFound(name.clone()));
            }
            builder.expand(name, true)?;
        }
        for name in lenient_targets {
            match manager.classify(name) {
                Classification::Unavailable => {
                    tracing::debug!(node = %name, "Skipping unknown lenient target");
                }
                _ => builder.expand(name, false)?,
            }
        }

        builder.order()?;
        Ok(builder.dg)
    }

    /// Names in processing order; every dependency precedes its dependents.
    pub fn process_order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Number of nodes in the graph that consume `name` directly.
    pub fn dependents_count(&self, name: &str) -> usize {
        self.indices
            .get(name)
            .map_or(0, |&idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
    }

    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let mut deps: Vec<String> = match self.indices.get(name) {
            Some(&idx) => self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|d| self.graph[d].clone())
                .collect(),
            None => Vec::new(),
        };
        deps.sort();
        deps
    }

    pub fn adjacencies(&self) -> DependencyTree {
        DependencyTree(self.graph.node_weights().map(|n| (n.clone(), self.dependencies_of(n))).collect())
    }
}

struct Builder<'a> {
    manager: &'a NodeManager,
    dg: DependencyGraph,
    /// Nodes reached from a required target.
    strict: HashSet<NodeIndex>,
    /// Derivable nodes whose dependencies are all unclassifiable.
    dead: HashSet<NodeIndex>,
}

impl Builder<'_> {
    fn index_of(&mut self, name: &str) -> (NodeIndex, bool) {
        if let Some(&idx) = self.dg.indices.get(name) {
            return (idx, false);
        }
        let idx = self.dg.graph.add_node(name.to_string());
        self.dg.indices.insert(name.to_string(), idx);
        (idx, true)
    }

    /// Iterative DFS over declared dependency names.
    fn expand(&mut self, target: &str, strict: bool) -> Result<(), GraphError> {
        let mut stack = vec![target.to_string()];

        while let Some(name) = stack.pop() {
            let (idx, is_new) = self.index_of(&name);
            let newly_strict = strict && self.strict.insert(idx);
            if !is_new && !newly_strict {
                continue;
            }

            let node = match self.manager.classify(&name) {
                Classification::Derivable(node) => node,
                // Leaves: channels, attributes and unavailable names.
                _ => continue,
            };

            let deps = node.dependencies();
            let all_unavailable = deps
                .iter()
                .all(|d| matches!(self.manager.classify(&d.name), Classification::Unavailable));
            if all_unavailable {
                if strict {
                    return Err(GraphError::NoDependenciesAvailable(name));
                }
                tracing::debug!(node = %name, "Excluding node with no available dependencies");
                self.dead.insert(idx);
            }

            for dep in deps {
                let (dep_idx, _) = self.index_of(&dep.name);
                self.dg.graph.update_edge(idx, dep_idx, ());
                stack.push(dep.name.to_string());
            }
        }
        Ok(())
    }

    /// Kahn's algorithm with a lexical tie-break, resolving availability as
    /// each node is released.
    fn order(&mut self) -> Result<(), GraphError> {
        let graph = &self.dg.graph;
        let mut remaining: HashMap<NodeIndex, usize> = graph
            .node_indices()
            .map(|i| (i, graph.neighbors_directed(i, Direction::Outgoing).count()))
            .collect();
        let mut ready: BTreeSet<(String, NodeIndex)> = remaining
            .iter()
            .filter(|&(_, &n)| n == 0)
            .map(|(&i, _)| (graph[i].clone(), i))
            .collect();

        let mut available: HashSet<NodeIndex> = HashSet::new();
        let mut processed = 0;

        while let Some((name, idx)) = ready.pop_first() {
            processed += 1;
            if self.is_operable(&name, idx, &available) {
                available.insert(idx);
                self.dg.order.push(name);
            }

            for dependent in graph.neighbors_directed(idx, Direction::Incoming) {
                if let Some(count) = remaining.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((graph[dependent].clone(), dependent));
                    }
                }
            }
        }

        if processed != graph.node_count() {
            let mut cycle: Vec<String> = tarjan_scc(graph)
                .into_iter()
                .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
                .flatten()
                .map(|i| graph[i].clone())
                .collect();
            cycle.sort();
            return Err(GraphError::CycleDetected(cycle));
        }

        let inactive: Vec<NodeIndex> = graph.node_indices().filter(|i| !available.contains(i)).collect();
        for idx in inactive {
            if self.strict.contains(&idx) && self.manager.required().contains(&self.dg.graph[idx]) {
                tracing::warn!(node = %self.dg.graph[idx], "Required node cannot be derived for this flight");
            }
            if let Some(name) = self.dg.graph.remove_node(idx) {
                self.dg.indices.remove(&name);
            }
        }
        tracing::info!(nodes = self.dg.order.len(), "Dependency order established");
        Ok(())
    }

    fn is_operable(&self, name: &str, idx: NodeIndex, available: &HashSet<NodeIndex>) -> bool {
        let node = match self.manager.classify(name) {
            Classification::Derivable(node) => node,
            other => return other.is_available_leaf(),
        };
        if self.dead.contains(&idx) {
            return false;
        }

        let graph = &self.dg.graph;
        let operable_deps: BTreeSet<&str> = graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter(|d| available.contains(d))
            .map(|d| graph[d].as_str())
            .collect();
        if operable_deps.is_empty() {
            tracing::debug!(node = %name, "No operable dependencies; node excluded");
            return false;
        }
        let operable = node.can_operate(&operable_deps);
        if !operable {
            tracing::debug!(node = %name, available = ?operable_deps, "can_operate rejected available dependencies");
        }
        operable
    }
}
