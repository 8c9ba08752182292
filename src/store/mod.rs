//! Flight data, metadata and the node catalogue a run draws from.
pub mod aircraft;
pub mod registry;
pub mod source;
pub mod types;

pub use aircraft::{AchievedFlightRecord, AircraftInfo};
pub use registry::{Classification, NodeManager, NodeRegistry};
pub use source::{FlightDataStore, MemoryStore, Session, StoreError};
pub use types::{Attribute, Frame, KeyPointValue, KeyTimeInstance, MaskedArray, NodeKind, Parameter, Section, Slice};
