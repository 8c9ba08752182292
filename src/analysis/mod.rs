//! Passes that run around the engine: before it (caching) and after it
//! (annotation of the accumulated outputs).
pub mod caching;
pub mod postprocess;

pub use caching::cache_candidates;
pub use postprocess::{geo_locate, position_channels, timestamp, Geolocate, Timestamp};
