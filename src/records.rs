//! Rows of the three ride streams and the per-ride grouping of positions.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

pub type RideId = u32;

/// `(minRideId, since)` applied by every source query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordFilter {
    pub min_ride_id: RideId,
    pub since: NaiveDateTime,
}

impl RecordFilter {
    pub fn accepts(&self, ride_id: RideId, timestamp: NaiveDateTime) -> bool {
        ride_id >= self.min_ride_id && timestamp >= self.since
    }
}

/// Accepts `YYYY-MM-DD HH:MM:SS[.f]`, the same with a `T` separator, or
/// RFC 3339 (converted to UTC).
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
}

/// One row of the position stream.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PositionRecord {
    #[serde(rename = "idRide", alias = "ride_id")]
    pub ride_id: RideId,
    #[serde(rename = "timeStamp", alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
}

impl PositionRecord {
    /// Finite and within WGS84 range
    pub fn has_valid_coordinates(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn sample(&self) -> PositionSample {
        PositionSample {
            latitude: self.latitude,
            longitude: self.longitude,
            timestamp: self.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
}

/// A close pass measured by the distance sensor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ProximityEvent {
    #[serde(rename = "idRide", alias = "ride_id")]
    pub ride_id: RideId,
    #[serde(rename = "timeStamp", alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "distanceCar", alias = "distance")]
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CrashEvent {
    #[serde(rename = "idRide", alias = "ride_id")]
    pub ride_id: RideId,
    #[serde(rename = "timeStamp", alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// Records that can be filtered and put in `(rideId, timestamp)` order.
pub trait RideRecord {
    fn ride_id(&self) -> RideId;
    fn timestamp(&self) -> NaiveDateTime;
}

macro_rules! impl_ride_record {
    ($($t:ty),*) => {
        $(impl RideRecord for $t {
            fn ride_id(&self) -> RideId {
                self.ride_id
            }
            fn timestamp(&self) -> NaiveDateTime {
                self.timestamp
            }
        })*
    };
}

impl_ride_record!(PositionRecord, ProximityEvent, CrashEvent);

/// Keeps the records accepted by `filter`, sorted by `(rideId, timestamp)`.
/// The sort is stable so equal keys keep their input order.
pub fn filter_and_sort<R: RideRecord>(records: Vec<R>, filter: &RecordFilter) -> Vec<R> {
    let mut kept: Vec<R> = records
        .into_iter()
        .filter(|r| filter.accepts(r.ride_id(), r.timestamp()))
        .collect();
    kept.sort_by_key(|r| (r.ride_id(), r.timestamp()));
    kept
}

/// Position samples grouped by ride, each in chronological order.
#[derive(Debug, Default, Clone)]
pub struct Rides {
    rides: BTreeMap<RideId, Vec<PositionSample>>,
}

impl Rides {
    pub fn push(&mut self, record: &PositionRecord) {
        self.rides
            .entry(record.ride_id)
            .or_default()
            .push(record.sample());
    }

    pub fn samples(&self, ride_id: RideId) -> Option<&[PositionSample]> {
        self.rides.get(&ride_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RideId, &Vec<PositionSample>)> {
        self.rides.iter()
    }
}
