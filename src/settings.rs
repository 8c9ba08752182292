//! Run configuration and the thresholds used by the built-in nodes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// --- Domain Constants ---

/// Height above airfield (ft) marking the start of a climb.
pub const CLIMB_THRESHOLD: f64 = 1000.0;

/// Ramp slope (ft/s) subtracted from altitude to locate top of climb/descent.
pub const SLOPE_FOR_TOC_TOD: f64 = 600.0 / 60.0;

/// Pressure altitude (ft) above which the flight is in climb/cruise/descent.
pub const CLIMB_CRUISE_DESCENT_MIN_ALTITUDE: f64 = 10000.0;

/// Rate of climb (fpm) beyond which the aircraft is climbing or descending.
pub const RATE_OF_CLIMB_FOR_CLIMB_PHASE: f64 = 800.0;

/// Climb (ft) after a low point that turns an approach into a go-around.
pub const GO_AROUND_CLIMB: f64 = 500.0;

/// Height (ft) below which a descent may end in a go-around.
pub const GO_AROUND_MAX_ALTITUDE: f64 = 3000.0;

pub const LATITUDE_CHANNEL: &str = "Latitude Smoothed";
pub const LONGITUDE_CHANNEL: &str = "Longitude Smoothed";

// --- Run Settings ---

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Unable to read settings: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Channels consumed by more than this many nodes are cached. 0 disables caching.
    pub cache_param_min_usage: usize,
    /// Target every flight attribute node in the registry.
    pub include_flight_attributes: bool,
    /// Attach positions to key point values as well as key time instances.
    pub geo_locate_key_point_values: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_param_min_usage: 0,
            include_flight_attributes: true,
            geo_locate_key_point_values: true,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_keys_take_defaults() {
        let settings = Settings::from_json(r#"{"cache_param_min_usage": 3}"#).unwrap();
        assert_eq!(settings.cache_param_min_usage, 3);
        assert!(settings.include_flight_attributes);
        assert!(settings.geo_locate_key_point_values);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"include_flight_attributes": false}}"#).unwrap();

        let settings = Settings::from_path(file.path()).unwrap();
        assert_eq!(settings, Settings { include_flight_attributes: false, ..Settings::default() });
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        assert!(matches!(Settings::from_json("{"), Err(SettingsError::Parse(_))));
        assert!(matches!(Settings::from_path("/nonexistent/settings.json"), Err(SettingsError::Io(_))));
    }
}
