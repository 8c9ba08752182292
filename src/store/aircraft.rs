//! Aircraft configuration and achieved flight record supplied by the caller.
//!
//! Every populated key becomes an [`Attribute`] of the same name, so nodes can
//! declare e.g. `"Flap Selections"` as a dependency.

use super::types::Attribute;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AircraftInfo {
    #[serde(rename = "Tail Number", default, skip_serializing_if = "Option::is_none")]
    pub tail_number: Option<String>,
    #[serde(rename = "Identifier", default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(rename = "Manufacturer", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(rename = "Manufacturer Serial Number", default, skip_serializing_if = "Option::is_none")]
    pub manufacturer_serial_number: Option<String>,
    /// e.g. 737-808-ER
    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "Series", default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(rename = "Family", default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Flap detents, e.g. `[0, 18, 24, 30, 33]`.
    #[serde(rename = "Flap Selections", default, skip_serializing_if = "Option::is_none")]
    pub flap_selections: Option<Vec<f64>>,
    /// Data frame name.
    #[serde(rename = "Frame", default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    /// Metres.
    #[serde(rename = "Main Gear To Altitude Radio", default, skip_serializing_if = "Option::is_none")]
    pub main_gear_to_altitude_radio: Option<f64>,
    /// Metres.
    #[serde(rename = "Wing Span", default, skip_serializing_if = "Option::is_none")]
    pub wing_span: Option<f64>,
    #[serde(rename = "Precise Positioning", default, skip_serializing_if = "Option::is_none")]
    pub precise_positioning: Option<bool>,
    /// Keys this struct does not model explicitly.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AircraftInfo {
    pub fn with_tail_number(tail_number: impl Into<String>) -> Self {
        Self { tail_number: Some(tail_number.into()), ..Default::default() }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text).map_err(std::io::Error::from)
    }

    /// One attribute per populated key, in key order.
    pub fn attributes(&self) -> Vec<Attribute> {
        // Round-tripping through serde keeps the key names in one place.
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| Attribute::new(k, v))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Free-form record of the achieved flight (e.g. airports, flight number).
pub type AchievedFlightRecord = BTreeMap<String, Value>;
