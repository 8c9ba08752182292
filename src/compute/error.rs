use crate::graph::dag::GraphError;
use crate::graph::node::NodeError;
use crate::store::source::StoreError;
use crate::store::types::NodeKind;
use thiserror::Error;

/// Fatal conditions that abort a flight's run.
///
/// Recoverable conditions (an empty flight attribute, a small length excess)
/// are logged by the engine and never surface here.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Configuration(#[from] GraphError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("No dependencies available - nodes cannot operate without ANY dependencies available! Node: {0}")]
    NoDependenciesResolved(String),

    #[error("Node '{node}' not present in the node registry")]
    NodeNotFound { node: String },

    #[error("{kind} '{name}' from node '{node}' has index {index:.2}, which is not between 0 and {duration}")]
    IndexOutOfRange { node: String, kind: &'static str, name: String, index: f64, duration: f64 },

    #[error("Section '{name}' from node '{node}' has {bound} {value:.2}, which does not lie between 0 and {limit}")]
    SectionOutOfRange { node: String, name: String, bound: &'static str, value: f64, limit: f64 },

    #[error("Array length mismatch for parameter '{node}'. Expected '{expected}', resulting array length '{actual}'")]
    LengthMismatch { node: String, expected: usize, actual: usize },

    #[error("Unknown node kind for '{node}': declared {declared:?}, produced {produced:?}")]
    UnknownKind { node: String, declared: NodeKind, produced: NodeKind },

    #[error("Cannot timestamp '{name}' at index {index}: datetime out of range")]
    DatetimeOutOfRange { name: String, index: f64 },

    #[error("Node '{node}' failed to derive: {source}")]
    Derive { node: String, #[source] source: NodeError },
}

impl ProcessError {
    /// The node the error is attributed to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            ProcessError::Configuration(GraphError::NodeNotFound(n))
            | ProcessError::Configuration(GraphError::NoDependenciesAvailable(n))
            | ProcessError::NoDependenciesResolved(n) => Some(n.as_str()),
            ProcessError::NodeNotFound { node }
            | ProcessError::IndexOutOfRange { node, .. }
            | ProcessError::SectionOutOfRange { node, .. }
            | ProcessError::LengthMismatch { node, .. }
            | ProcessError::UnknownKind { node, .. }
            | ProcessError::Derive { node, .. } => Some(node.as_str()),
            _ => None,
        }
    }
}
