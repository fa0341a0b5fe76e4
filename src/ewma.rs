//! EWMA smoothing downsampler
//!
//! Bounds memory for high-rate sensors: every raw sample updates a per-sensor
//! exponentially weighted moving average, but only one smoothed sample is
//! written to the underlying [`TimeSeriesStore`] per `window + 1` inputs.
//!
//! The average is never reset. Each emitted value carries the smoothing
//! history since the sensor's first sample; only the emission counter goes
//! back to zero.
//!
//! ```rust
//! use sensor_drift::ewma::{DownsampleConfig, EwmaDownsampler};
//! use sensor_drift::series::from_epoch_secs;
//!
//! let mut device = EwmaDownsampler::new("f6ce368d", DownsampleConfig::new(0, 0.5)).unwrap();
//! for (i, v) in [10.0, 20.0, 30.0].into_iter().enumerate() {
//!     device.add("Temperature", from_epoch_secs(i as i64).unwrap(), v);
//! }
//! let (_, values) = device.store().ordered("Temperature").unwrap();
//! assert_eq!(values, vec![10.0, 15.0, 22.5]);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::series::Timestamp;
use crate::store::{SensorId, TimeSeriesStore};

/// Smoothing and decimation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DownsampleConfig {
    /// Samples absorbed before an emission (emit when count > window)
    pub window: u32,
    /// Weight of the newest sample, in (0, 1]
    pub alpha: f64,
}

impl Default for DownsampleConfig {
    fn default() -> Self {
        Self {
            window: 100,
            alpha: 0.7,
        }
    }
}

impl DownsampleConfig {
    pub fn new(window: u32, alpha: f64) -> Self {
        Self { window, alpha }
    }

    /// Check that alpha lies in (0, 1]
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 || self.alpha > 1.0 {
            return Err(DriftError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Transient smoothing state of one sensor
#[derive(Debug, Clone, Copy, PartialEq)]
struct EwmaState {
    ewma: f64,
    count: u32,
}

/// Entity storing only EWMA-emitted samples
#[derive(Debug, Clone)]
pub struct EwmaDownsampler {
    store: TimeSeriesStore,
    config: DownsampleConfig,
    state: HashMap<SensorId, EwmaState>,
    absorbed: u64,
}

impl EwmaDownsampler {
    /// Create a downsampler for an entity
    pub fn new(entity_id: impl Into<String>, config: DownsampleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: TimeSeriesStore::new(entity_id),
            config,
            state: HashMap::new(),
            absorbed: 0,
        })
    }

    /// Feed one raw sample
    ///
    /// Returns the emitted smoothed value when this sample tripped the
    /// window threshold.
    pub fn add(&mut self, sensor_id: &str, timestamp: Timestamp, value: f64) -> Option<f64> {
        let state = match self.state.get_mut(sensor_id) {
            Some(state) => state,
            None => {
                self.store.touch(sensor_id);
                self.state
                    .entry(sensor_id.to_string())
                    .or_insert(EwmaState {
                        ewma: value,
                        count: 0,
                    })
            }
        };

        state.count += 1;
        let alpha = self.config.alpha;
        state.ewma = alpha * value + (1.0 - alpha) * state.ewma;

        if state.count > self.config.window {
            state.count = 0;
            let emitted = state.ewma;
            self.store.add(sensor_id, timestamp, emitted);
            Some(emitted)
        } else {
            self.absorbed += 1;
            None
        }
    }

    /// Underlying store of emitted samples
    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    pub fn config(&self) -> &DownsampleConfig {
        &self.config
    }

    /// Current smoothed value of a sensor
    pub fn current(&self, sensor_id: &str) -> Option<f64> {
        self.state.get(sensor_id).map(|s| s.ewma)
    }

    /// Samples received since the last emission for a sensor
    pub fn pending(&self, sensor_id: &str) -> Option<u32> {
        self.state.get(sensor_id).map(|s| s.count)
    }

    /// Samples that updated the average without being emitted
    pub fn absorbed(&self) -> u64 {
        self.absorbed
    }
}
