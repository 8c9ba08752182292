//! Core value types shared by the registry, the engine and the nodes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The result kind a node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Static flight metadata supplied by the caller.
    Attribute,
    /// A raw recorder channel.
    Parameter,
    DerivedParameter,
    Section,
    KeyTimeInstance,
    KeyPointValue,
    FlightAttribute,
}

/// Sampling frequency (Hz) and offset (seconds) of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub frequency: f64,
    pub offset: f64,
}

impl Frame {
    pub const ONE_HZ: Frame = Frame { frequency: 1.0, offset: 0.0 };

    pub fn new(frequency: f64, offset: f64) -> Self {
        Self { frequency, offset }
    }

    /// Converts a sample index in `self` to the equivalent index in `to`.
    #[inline]
    pub fn convert_index(&self, index: f64, to: Frame) -> f64 {
        let seconds = index / self.frequency + self.offset;
        (seconds - to.offset) * to.frequency
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::ONE_HZ
    }
}

// --- Masked Arrays ---

/// A sample array where any sample may be marked invalid.
///
/// `mask[i] == true` means sample `i` is invalid. The mask always has one
/// entry per sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMaskedArray")]
pub struct MaskedArray {
    data: Vec<f64>,
    mask: Vec<bool>,
}

/// Wire form of [`MaskedArray`]; the mask may be missing or mis-sized.
#[derive(Deserialize)]
struct RawMaskedArray {
    data: Vec<f64>,
    #[serde(default)]
    mask: Vec<bool>,
}

impl From<RawMaskedArray> for MaskedArray {
    fn from(raw: RawMaskedArray) -> Self {
        MaskedArray::with_mask(raw.data, raw.mask)
    }
}

impl MaskedArray {
    pub fn new(data: Vec<f64>) -> Self {
        let mask = vec![false; data.len()];
        Self { data, mask }
    }

    /// Builds an array from optional samples; `None` becomes a masked sample.
    pub fn from_options(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let (data, mask) = values
            .into_iter()
            .map(|v| match v {
                Some(x) => (x, false),
                None => (0.0, true),
            })
            .unzip();
        Self { data, mask }
    }

    /// Pairs data with a mask. A mask of the wrong length is padded or cut.
    pub fn with_mask(data: Vec<f64>, mut mask: Vec<bool>) -> Self {
        mask.resize(data.len(), false);
        Self { data, mask }
    }

    /// A fully masked array of zeros.
    pub fn masked_zeros(len: usize) -> Self {
        Self { data: vec![0.0; len], mask: vec![true; len] }
    }

    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    #[inline]
    pub fn get(&self, i: usize) -> Option<f64> {
        match self.mask.get(i) {
            Some(false) => Some(self.data[i]),
            _ => None,
        }
    }

    pub fn is_masked(&self, i: usize) -> bool {
        self.mask.get(i).copied().unwrap_or(true)
    }

    pub fn is_fully_masked(&self) -> bool {
        self.mask.iter().all(|&m| m)
    }

    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
        self.mask.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<f64>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Clamps a half-open `[start, stop)` range to the array bounds.
    fn clamp(&self, start: usize, stop: usize) -> (usize, usize) {
        let stop = stop.min(self.len());
        (start.min(stop), stop)
    }

    /// Index of the largest valid sample in `[start, stop)`. First wins on ties.
    pub fn argmax_in(&self, start: usize, stop: usize) -> Option<usize> {
        self.arg_best(start, stop, |candidate, best| candidate > best)
    }

    /// Index of the smallest valid sample in `[start, stop)`. First wins on ties.
    pub fn argmin_in(&self, start: usize, stop: usize) -> Option<usize> {
        self.arg_best(start, stop, |candidate, best| candidate < best)
    }

    fn arg_best(&self, start: usize, stop: usize, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
        let (start, stop) = self.clamp(start, stop);
        let mut best: Option<(usize, f64)> = None;
        for i in start..stop {
            if let Some(v) = self.get(i) {
                match best {
                    Some((_, b)) if !better(v, b) => {}
                    _ => best = Some((i, v)),
                }
            }
        }
        best.map(|(i, _)| i)
    }

    pub fn min_valid(&self) -> Option<f64> {
        self.argmin_in(0, self.len()).map(|i| self.data[i])
    }

    pub fn max_valid(&self) -> Option<f64> {
        self.argmax_in(0, self.len()).map(|i| self.data[i])
    }

    /// Linear interpolation at a fractional sample index.
    ///
    /// Returns `None` outside the array or when a neighbouring sample is masked.
    pub fn interpolate(&self, index: f64) -> Option<f64> {
        if !index.is_finite() || index < 0.0 {
            return None;
        }
        let lower = index.floor() as usize;
        let frac = index - lower as f64;
        let lo = self.get(lower)?;
        if frac == 0.0 {
            return Some(lo);
        }
        let hi = self.get(lower + 1)?;
        Some(lo + (hi - lo) * frac)
    }
}

// --- Time Series ---

/// A recorded or derived time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub array: MaskedArray,
    pub frequency: f64,
    pub offset: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, array: MaskedArray, frequency: f64, offset: f64) -> Self {
        Self { name: name.into(), array, frequency, offset }
    }

    pub fn frame(&self) -> Frame {
        Frame::new(self.frequency, self.offset)
    }

    /// Interpolated value at an index expressed in `frame`.
    pub fn value_at(&self, index: f64, frame: Frame) -> Option<f64> {
        self.array.interpolate(frame.convert_index(index, self.frame()))
    }
}

// --- Intervals and Events ---

/// Start/stop sample indices. `None` means the interval is open on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub start: Option<f64>,
    pub stop: Option<f64>,
}

impl Slice {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start: Some(start), stop: Some(stop) }
    }

    /// Integer sample range covered by this slice, clamped to `len`.
    pub fn to_range(&self, len: usize) -> (usize, usize) {
        let start = self.start.map_or(0, |s| s.max(0.0).floor() as usize).min(len);
        let stop = self.stop.map_or(len, |s| s.max(0.0).ceil() as usize).min(len);
        (start, stop.max(start))
    }

    pub fn convert(&self, from: Frame, to: Frame) -> Self {
        Self {
            start: self.start.map(|i| from.convert_index(i, to)),
            stop: self.stop.map(|i| from.convert_index(i, to)),
        }
    }
}

/// A named interval over the flight timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub slice: Slice,
    pub start_edge: Option<f64>,
    pub stop_edge: Option<f64>,
}

impl Section {
    pub fn new(name: impl Into<String>, slice: Slice) -> Self {
        Self { name: name.into(), slice, start_edge: None, stop_edge: None }
    }

    pub fn with_edges(mut self, start_edge: Option<f64>, stop_edge: Option<f64>) -> Self {
        self.start_edge = start_edge;
        self.stop_edge = stop_edge;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyTimeInstance {
    pub index: f64,
    pub name: String,
    /// Descriptive values used to fill a name template, e.g. a flap setting.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<DateTime<Utc>>,
}

impl KeyTimeInstance {
    pub fn new(index: f64, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            fields: BTreeMap::new(),
            latitude: None,
            longitude: None,
            datetime: None,
        }
    }

    /// Creates an instance named from `template`, e.g. `"Flap {setting}"`.
    pub fn formatted(index: f64, template: &str, fields: BTreeMap<String, f64>) -> Self {
        let mut kti = Self::new(index, format_name(template, &fields));
        kti.fields = fields;
        kti
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPointValue {
    pub index: f64,
    pub value: f64,
    pub name: String,
    /// The section the value was measured within, if any.
    pub slice: Option<Slice>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub datetime: Option<DateTime<Utc>>,
}

impl KeyPointValue {
    pub fn new(index: f64, value: f64, name: impl Into<String>) -> Self {
        Self {
            index,
            value,
            name: name.into(),
            slice: None,
            latitude: None,
            longitude: None,
            datetime: None,
        }
    }

    pub fn within(mut self, slice: Slice) -> Self {
        self.slice = Some(slice);
        self
    }
}

/// Static flight metadata or the result of a flight attribute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: serde_json::Value,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// Substitutes `{field}` placeholders. Integral values print without decimals.
pub fn format_name(template: &str, fields: &BTreeMap<String, f64>) -> String {
    let mut name = template.to_string();
    for (key, value) in fields {
        let rendered = if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", *value as i64)
        } else {
            format!("{}", value)
        };
        name = name.replace(&format!("{{{}}}", key), &rendered);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_conversion() {
        let half_hz = Frame::new(0.5, 0.0);
        let quarter_offset = Frame::new(1.0, 0.25);
        assert_eq!(half_hz.convert_index(10.0, Frame::ONE_HZ), 20.0);
        assert_eq!(quarter_offset.convert_index(4.0, Frame::ONE_HZ), 4.25);
        assert_eq!(Frame::ONE_HZ.convert_index(4.25, quarter_offset), 4.0);
    }

    #[test]
    fn test_masked_argmax_skips_masked_samples() {
        let arr = MaskedArray::with_mask(vec![1.0, 9.0, 3.0, 5.0], vec![false, true, false, false]);
        assert_eq!(arr.argmax_in(0, 4), Some(3));
        assert_eq!(arr.argmin_in(1, 4), Some(2));
        assert_eq!(arr.argmax_in(1, 2), None);
        // Stop past the end is clamped.
        assert_eq!(arr.argmax_in(2, 100), Some(3));
    }

    #[test]
    fn test_interpolate() {
        let arr = MaskedArray::with_mask(vec![0.0, 10.0, 20.0], vec![false, false, true]);
        assert_eq!(arr.interpolate(0.5), Some(5.0));
        assert_eq!(arr.interpolate(1.0), Some(10.0));
        assert_eq!(arr.interpolate(1.5), None);
        assert_eq!(arr.interpolate(-0.1), None);
    }

    #[test]
    fn test_deserialized_mask_matches_data() {
        let arr: MaskedArray = serde_json::from_str(r#"{"data":[1.0],"mask":[false,false]}"#).unwrap();
        assert_eq!(arr, MaskedArray::new(vec![1.0]));
        assert_eq!(arr.interpolate(1.0), None);
        assert_eq!(arr.get(1), None);

        let arr: MaskedArray = serde_json::from_str(r#"{"data":[1.0,2.0],"mask":[true]}"#).unwrap();
        assert_eq!(arr.iter().collect::<Vec<_>>(), vec![None, Some(2.0)]);

        let arr: MaskedArray = serde_json::from_str(r#"{"data":[3.0]}"#).unwrap();
        assert_eq!(arr.get(0), Some(3.0));
    }

    #[test]
    fn test_masked_zeros() {
        let arr = MaskedArray::masked_zeros(3);
        assert_eq!(arr.len(), 3);
        assert!(arr.is_fully_masked());
        assert_eq!(arr.get(0), None);
    }

    #[test]
    fn test_slice_range_is_clamped() {
        assert_eq!(Slice::new(2.4, 7.2).to_range(100), (2, 8));
        assert_eq!(Slice { start: None, stop: Some(500.0) }.to_range(10), (0, 10));
        assert_eq!(Slice { start: Some(20.0), stop: None }.to_range(10), (10, 10));
    }

    #[test]
    fn test_format_name() {
        let mut fields = BTreeMap::new();
        fields.insert("setting".to_string(), 15.0);
        assert_eq!(format_name("Flap {setting}", &fields), "Flap 15");
        fields.insert("setting".to_string(), 2.5);
        assert_eq!(format_name("Flap {setting}", &fields), "Flap 2.5");
    }
}
