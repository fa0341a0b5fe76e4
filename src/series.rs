//! Sensor series primitives
//!
//! A [`SensorSeries`] maps timestamps to values for one sensor. Keys are
//! unique (a second write at the same timestamp overwrites the first) and
//! iteration is always in ascending timestamp order, whatever the insertion
//! order was.

use std::collections::btree_map;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Instant at which a sample was taken (second precision is sufficient)
pub type Timestamp = DateTime<Utc>;

/// Convert integer epoch seconds into a [`Timestamp`]
///
/// Returns `None` when the value is outside the representable range.
pub fn from_epoch_secs(secs: i64) -> Option<Timestamp> {
    DateTime::from_timestamp(secs, 0)
}

/// A single timestamped reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A value at a known position of an ordered series
///
/// `index` is the position in the source series (bucket index for resampled
/// and differenced series), so reports can point back at the source data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub index: usize,
    pub timestamp: Timestamp,
    pub value: f64,
}

impl Observation {
    pub fn new(index: usize, timestamp: Timestamp, value: f64) -> Self {
        Self {
            index,
            timestamp,
            value,
        }
    }
}

/// Ordered timestamp -> value mapping for one sensor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSeries {
    values: BTreeMap<Timestamp, f64>,
}

impl SensorSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any value already stored at `timestamp`
    ///
    /// Returns the replaced value, if any.
    pub fn insert(&mut self, timestamp: Timestamp, value: f64) -> Option<f64> {
        self.values.insert(timestamp, value)
    }

    /// Value stored at exactly `timestamp`
    pub fn get(&self, timestamp: &Timestamp) -> Option<f64> {
        self.values.get(timestamp).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest timestamp in the series
    pub fn min_timestamp(&self) -> Option<Timestamp> {
        self.values.keys().next().copied()
    }

    /// Largest timestamp in the series
    pub fn max_timestamp(&self) -> Option<Timestamp> {
        self.values.keys().next_back().copied()
    }

    /// Iterate over samples in ascending timestamp order
    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.values.iter().map(|(ts, v)| Sample::new(*ts, *v))
    }

    /// Samples as positionally indexed observations
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, (ts, v))| Observation::new(i, *ts, *v))
    }

    /// Split the series into parallel timestamp and value vectors
    ///
    /// Position `i` of both vectors refers to the same sample.
    pub fn ordered(&self) -> (Vec<Timestamp>, Vec<f64>) {
        self.values.iter().map(|(ts, v)| (*ts, *v)).unzip()
    }
}

impl FromIterator<Sample> for SensorSeries {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut series = SensorSeries::new();
        for sample in iter {
            series.insert(sample.timestamp, sample.value);
        }
        series
    }
}

impl<'a> IntoIterator for &'a SensorSeries {
    type Item = (&'a Timestamp, &'a f64);
    type IntoIter = btree_map::Iter<'a, Timestamp, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
