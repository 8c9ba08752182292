//! Reconciles values recorded at different frequencies and offsets.
//!
//! Everything a node receives is expressed in the node's computation frame:
//! parameters are resampled, indexed items have their indices converted.

use crate::graph::node::{Dependencies, Indexed, NodeValue};
use crate::store::types::{Frame, KeyPointValue, KeyTimeInstance, MaskedArray, Parameter, Section};
use std::sync::Arc;

/// Sample count for a fractional length. Values within rounding noise of an
/// integer snap to it, anything else rounds up.
pub(crate) fn sample_count(exact: f64) -> usize {
    if exact <= 0.0 {
        return 0;
    }
    let nearest = exact.round();
    if (exact - nearest).abs() < 1e-6 {
        nearest as usize
    } else {
        exact.ceil() as usize
    }
}

/// Resamples a parameter into `to` by linear interpolation.
pub fn align_parameter(param: &Parameter, to: Frame) -> Parameter {
    let from = param.frame();
    if from == to {
        return param.clone();
    }
    let len = sample_count(param.array.len() as f64 * to.frequency / from.frequency);
    let array = MaskedArray::from_options((0..len).map(|i| param.array.interpolate(to.convert_index(i as f64, from))));
    Parameter::new(param.name.clone(), array, to.frequency, to.offset)
}

/// Items whose indices can be moved between frames.
pub trait Realign: Clone {
    fn realign(&self, from: Frame, to: Frame) -> Self;
}

impl Realign for KeyTimeInstance {
    fn realign(&self, from: Frame, to: Frame) -> Self {
        Self { index: from.convert_index(self.index, to), ..self.clone() }
    }
}

impl Realign for KeyPointValue {
    fn realign(&self, from: Frame, to: Frame) -> Self {
        Self {
            index: from.convert_index(self.index, to),
            slice: self.slice.map(|s| s.convert(from, to)),
            ..self.clone()
        }
    }
}

impl Realign for Section {
    fn realign(&self, from: Frame, to: Frame) -> Self {
        Self {
            name: self.name.clone(),
            slice: self.slice.convert(from, to),
            start_edge: self.start_edge.map(|e| from.convert_index(e, to)),
            stop_edge: self.stop_edge.map(|e| from.convert_index(e, to)),
        }
    }
}

pub fn realign_all<T: Realign>(items: &[T], from: Frame, to: Frame) -> Vec<T> {
    if from == to {
        return items.to_vec();
    }
    items.iter().map(|item| item.realign(from, to)).collect()
}

fn align_indexed<T: Realign>(indexed: Indexed<T>, to: Frame) -> Indexed<T> {
    if indexed.frame == to {
        return indexed;
    }
    Indexed::new(to, realign_all(&indexed.items, indexed.frame, to))
}

/// Moves a resolved value into `to`. Attributes pass through unchanged.
pub fn align_value(value: NodeValue, to: Frame) -> NodeValue {
    match value {
        NodeValue::Parameter(p) if p.frame() != to => NodeValue::Parameter(Arc::new(align_parameter(&p, to))),
        NodeValue::Sections(s) => NodeValue::Sections(align_indexed(s, to)),
        NodeValue::KeyTimeInstances(k) => NodeValue::KeyTimeInstances(align_indexed(k, to)),
        NodeValue::KeyPointValues(k) => NodeValue::KeyPointValues(align_indexed(k, to)),
        other => other,
    }
}

/// The frame of the first present dependency that has one, in declared
/// order. Attribute-only inputs run at 1 Hz with no offset.
pub fn select_frame(deps: &Dependencies) -> Frame {
    deps.iter()
        .filter_map(|(_, v)| v.and_then(NodeValue::frame))
        .next()
        .unwrap_or(Frame::ONE_HZ)
}
