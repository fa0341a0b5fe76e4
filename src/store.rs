//! Per-entity time-series storage
//!
//! A [`TimeSeriesStore`] holds every sensor series of one entity (a device or
//! node). Series are created lazily on the first write for a sensor.

use std::collections::HashMap;

use crate::error::{DriftError, Result};
use crate::series::{SensorSeries, Timestamp};

/// Identifier of a sensor (e.g. "Temperature")
pub type SensorId = String;

/// Sensor series of a single entity
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    entity_id: String,
    sensors: HashMap<SensorId, SensorSeries>,
}

impl TimeSeriesStore {
    /// Create an empty store for the given entity
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            sensors: HashMap::new(),
        }
    }

    /// Entity this store belongs to
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Insert or overwrite a value
    pub fn add(&mut self, sensor_id: &str, timestamp: Timestamp, value: f64) {
        // Avoid allocating the key when the series already exists
        if let Some(series) = self.sensors.get_mut(sensor_id) {
            series.insert(timestamp, value);
        } else {
            let mut series = SensorSeries::new();
            series.insert(timestamp, value);
            self.sensors.insert(sensor_id.to_string(), series);
        }
    }

    /// Whether a series exists for the sensor
    pub fn has(&self, sensor_id: &str) -> bool {
        self.sensors.contains_key(sensor_id)
    }

    /// Get a sensor series
    pub fn series(&self, sensor_id: &str) -> Result<&SensorSeries> {
        self.sensors
            .get(sensor_id)
            .ok_or_else(|| DriftError::sensor_not_found(&self.entity_id, sensor_id))
    }

    /// Ascending timestamps and their values
    pub fn ordered(&self, sensor_id: &str) -> Result<(Vec<Timestamp>, Vec<f64>)> {
        Ok(self.series(sensor_id)?.ordered())
    }

    /// Smallest timestamp stored for the sensor
    pub fn min_timestamp(&self, sensor_id: &str) -> Result<Timestamp> {
        self.series(sensor_id)?
            .min_timestamp()
            .ok_or_else(|| DriftError::sensor_not_found(&self.entity_id, sensor_id))
    }

    /// Value stored at exactly `timestamp`, if any
    pub fn value_at(&self, sensor_id: &str, timestamp: &Timestamp) -> Result<Option<f64>> {
        Ok(self.series(sensor_id)?.get(timestamp))
    }

    /// Sensor identifiers, sorted
    pub fn sensor_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sensors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of sensors
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Total samples across all sensors
    pub fn sample_count(&self) -> usize {
        self.sensors.values().map(SensorSeries::len).sum()
    }

    /// Register an empty series for a sensor without adding a sample
    pub(crate) fn touch(&mut self, sensor_id: &str) {
        if !self.sensors.contains_key(sensor_id) {
            self.sensors
                .insert(sensor_id.to_string(), SensorSeries::new());
        }
    }
}
