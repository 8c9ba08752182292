//! The node contract and the per-flight dependency graph.
pub mod dag;
pub mod node;

pub use dag::{DependencyGraph, DependencyTree, GraphError};
pub use node::{Dependencies, Dependency, Indexed, Node, NodeError, NodeOutput, NodeValue};
