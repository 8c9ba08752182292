//! Annotation passes over the accumulated outputs.
//!
//! Both passes run once, after derivation, on items already expressed at
//! 1 Hz with zero offset. List order is preserved.

use crate::compute::error::ProcessError;
use crate::settings::{LATITUDE_CHANNEL, LONGITUDE_CHANNEL};
use crate::store::source::{FlightDataStore, StoreError};
use crate::store::types::{Frame, KeyPointValue, KeyTimeInstance, Parameter};
use chrono::{DateTime, Duration, Utc};

/// Items that can carry a position.
pub trait Geolocate {
    fn index(&self) -> f64;
    fn set_position(&mut self, latitude: Option<f64>, longitude: Option<f64>);
}

/// Items that can carry an absolute time.
pub trait Timestamp {
    fn name(&self) -> &str;
    fn index(&self) -> f64;
    fn set_datetime(&mut self, datetime: DateTime<Utc>);
}

macro_rules! impl_annotations {
    ($($ty:ty),*) => {$(
        impl Geolocate for $ty {
            #[inline(always)]
            fn index(&self) -> f64 { self.index }
            fn set_position(&mut self, latitude: Option<f64>, longitude: Option<f64>) {
                self.latitude = latitude;
                self.longitude = longitude;
            }
        }

        impl Timestamp for $ty {
            fn name(&self) -> &str { &self.name }
            #[inline(always)]
            fn index(&self) -> f64 { self.index }
            fn set_datetime(&mut self, datetime: DateTime<Utc>) {
                self.datetime = Some(datetime);
            }
        }
    )*};
}

impl_annotations!(KeyTimeInstance, KeyPointValue);

/// Position channels, when the flight records both.
pub fn position_channels<S: FlightDataStore + ?Sized>(store: &mut S) -> Result<Option<(Parameter, Parameter)>, StoreError> {
    if !store.contains(LATITUDE_CHANNEL) || !store.contains(LONGITUDE_CHANNEL) {
        return Ok(None);
    }
    Ok(Some((store.read(LATITUDE_CHANNEL)?, store.read(LONGITUDE_CHANNEL)?)))
}

/// Attaches the interpolated position at each item's index.
pub fn geo_locate<T: Geolocate>(items: &mut [T], latitude: &Parameter, longitude: &Parameter) {
    for item in items.iter_mut() {
        let index = Geolocate::index(item);
        item.set_position(latitude.value_at(index, Frame::ONE_HZ), longitude.value_at(index, Frame::ONE_HZ));
    }
}

/// `start` moved by `seconds`, to the millisecond. `None` when the result
/// is not representable.
pub fn offset_datetime(start: DateTime<Utc>, seconds: f64) -> Option<DateTime<Utc>> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64).and_then(|delta| start.checked_add_signed(delta))
}

/// Sets each item's datetime to `start + index` seconds.
pub fn timestamp<T: Timestamp>(items: &mut [T], start: DateTime<Utc>) -> Result<(), ProcessError> {
    for item in items.iter_mut() {
        let index = Timestamp::index(item);
        let datetime = offset_datetime(start, index)
            .ok_or_else(|| ProcessError::DatetimeOutOfRange { name: item.name().to_string(), index })?;
        item.set_datetime(datetime);
    }
    Ok(())
}
