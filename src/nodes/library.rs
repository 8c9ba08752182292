//! Numeric helpers shared by the built-in nodes.
//!
//! All ranges are half-open sample ranges `[start, stop)` clamped to the array.

use crate::store::types::MaskedArray;

/// Which side of an altitude peak a ramp search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Climb,
    Descent,
}

/// Locates top of climb or top of descent within `[start, stop)`.
///
/// A ramp of `slope_per_sample` is subtracted from the altitude on the chosen
/// side of the peak; the maximum of the difference is where the aircraft
/// stops climbing faster (or starts descending faster) than the ramp.
pub fn find_toc_tod(alt: &MaskedArray, start: usize, stop: usize, ramp: Ramp, slope_per_sample: f64) -> Option<usize> {
    let peak = alt.argmax_in(start, stop)?;
    let (from, to, slope) = match ramp {
        Ramp::Climb => (start, peak + 1, slope_per_sample),
        Ramp::Descent => (peak, stop.min(alt.len()), -slope_per_sample),
    };
    if from >= to {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for i in from..to {
        let Some(value) = alt.get(i) else { continue };
        let score = value - (i - from) as f64 * slope;
        if best.map_or(true, |(_, b)| score > b) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Fractional index where `array` first reaches `threshold` within
/// `[start, stop)`, linearly interpolated between samples.
pub fn index_at_value(array: &MaskedArray, start: usize, stop: usize, threshold: f64) -> Option<f64> {
    let stop = stop.min(array.len());
    if start >= stop {
        return None;
    }
    if array.get(start) == Some(threshold) {
        return Some(start as f64);
    }
    for i in start..stop.saturating_sub(1) {
        let (Some(a), Some(b)) = (array.get(i), array.get(i + 1)) else { continue };
        let crosses = (a < threshold && threshold <= b) || (a > threshold && threshold >= b);
        if crosses {
            return Some(i as f64 + (threshold - a) / (b - a));
        }
    }
    None
}

/// Maximal runs of valid samples satisfying `pred`, as `(start, stop)`.
pub fn runs_where(array: &MaskedArray, pred: impl Fn(f64) -> bool) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut current: Option<usize> = None;
    for (i, value) in array.iter().enumerate() {
        match (value.map_or(false, &pred), current) {
            (true, None) => current = Some(i),
            (false, Some(start)) => {
                runs.push((start, i));
                current = None;
            }
            _ => {}
        }
    }
    if let Some(start) = current {
        runs.push((start, array.len()));
    }
    runs
}

/// Per-second rate of change by central difference; one-sided at the ends.
pub fn rate_of_change(array: &MaskedArray, frequency: f64) -> MaskedArray {
    let n = array.len();
    if n < 2 {
        return MaskedArray::masked_zeros(n);
    }
    MaskedArray::from_options((0..n).map(|i| {
        let lo = i.saturating_sub(1);
        let hi = (i + 1).min(n - 1);
        let (a, b) = (array.get(lo)?, array.get(hi)?);
        Some((b - a) * frequency / (hi - lo) as f64)
    }))
}
