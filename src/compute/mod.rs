//! Runs a processing order against a flight's data.
pub mod align;
pub mod engine;
pub mod error;
pub mod ledger;

pub use engine::Engine;
pub use error::ProcessError;
pub use ledger::{FlightResults, Ledger};
