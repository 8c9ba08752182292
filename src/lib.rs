//! Flight data derivation engine.
//!
//! Nodes declare named dependencies; for each flight the engine builds a
//! dependency graph over what the recording actually contains, orders it,
//! runs every node in the common frame of its inputs and collects key time
//! instances, key point values, sections and flight attributes.

// --- Module Declarations ---
pub mod analysis;
pub mod compute;
pub mod graph;
pub mod nodes;
pub mod process;
pub mod settings;
pub mod store;

// --- Re-exports ---
pub use compute::{Engine, FlightResults, Ledger, ProcessError};
pub use graph::{Dependencies, Dependency, DependencyGraph, DependencyTree, GraphError, Node, NodeError, NodeOutput};
pub use nodes::builtin_registry;
pub use process::{FlightProcessor, PreFlightHook};
pub use settings::Settings;
pub use store::{
    AchievedFlightRecord, AircraftInfo, Attribute, FlightDataStore, Frame, KeyPointValue, KeyTimeInstance, MaskedArray,
    MemoryStore, NodeKind, NodeManager, NodeRegistry, Parameter, Section, Slice, StoreError,
};
