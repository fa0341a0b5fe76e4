//! Engine configuration
//!
//! Everything the engine needs to know up front: which kind of entity to
//! create, the resampling grid, and which detector to run for which sensor.
//! Configuration is plain data, loadable from JSON.
//!
//! ```rust
//! use sensor_drift::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "entity": { "kind": "aggregating", "window": 100, "alpha": 0.7 },
//!     "resample": { "bucket_width_secs": 3600 },
//!     "detectors": {
//!         "by_sensor": {
//!             "Temperature": { "algorithm": "hddm_w", "drift_confidence": 0.001,
//!                              "warning_confidence": 0.005, "lambda": 0.0001,
//!                              "two_sided": true }
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert!(config.detectors.for_sensor("Temperature").is_ok());
//! assert!(config.detectors.for_sensor("Light").is_err());
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::detector::DetectorConfig;
use crate::entity::EntityKind;
use crate::error::{DriftError, Result};
use crate::series::{from_epoch_secs, Timestamp};

/// Largest bucket width representable as a millisecond duration
pub const MAX_BUCKET_WIDTH_SECS: i64 = i64::MAX / 1_000;

/// Bucket grid used by resampled and differenced passes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampleConfig {
    /// Bucket width in seconds (must be positive)
    pub bucket_width_secs: i64,
    /// Start of bucket 0 as epoch seconds; defaults to the series minimum
    #[serde(default)]
    pub anchor_epoch_secs: Option<i64>,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            bucket_width_secs: 3600,
            anchor_epoch_secs: None,
        }
    }
}

impl ResampleConfig {
    pub fn new(bucket_width_secs: i64) -> Self {
        Self {
            bucket_width_secs,
            anchor_epoch_secs: None,
        }
    }

    /// Same grid with an explicit anchor
    pub fn with_anchor(mut self, anchor_epoch_secs: i64) -> Self {
        self.anchor_epoch_secs = Some(anchor_epoch_secs);
        self
    }

    /// Bucket width, clamped to the representable range
    pub fn width(&self) -> Duration {
        Duration::seconds(self.bucket_width_secs.min(MAX_BUCKET_WIDTH_SECS))
    }

    /// Explicit anchor, if configured
    pub fn anchor(&self) -> Result<Option<Timestamp>> {
        match self.anchor_epoch_secs {
            None => Ok(None),
            Some(secs) => from_epoch_secs(secs).map(Some).ok_or_else(|| {
                DriftError::InvalidConfig(format!("anchor {} out of range", secs))
            }),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket_width_secs <= 0 || self.bucket_width_secs > MAX_BUCKET_WIDTH_SECS {
            return Err(DriftError::InvalidConfig(format!(
                "bucket_width_secs must be in 1..={}, got {}",
                MAX_BUCKET_WIDTH_SECS, self.bucket_width_secs
            )));
        }
        self.anchor().map(|_| ())
    }
}

/// Sensor to detector mapping
///
/// There are no built-in per-sensor defaults. A sensor with no entry uses the
/// `fallback` profile when one is configured, otherwise it is a configuration
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorProfiles {
    #[serde(default)]
    pub by_sensor: HashMap<String, DetectorConfig>,
    #[serde(default)]
    pub fallback: Option<DetectorConfig>,
}

impl DetectorProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profiles where every sensor uses the same detector
    pub fn uniform(config: DetectorConfig) -> Self {
        Self {
            by_sensor: HashMap::new(),
            fallback: Some(config),
        }
    }

    pub fn with_sensor(mut self, sensor_id: impl Into<String>, config: DetectorConfig) -> Self {
        self.by_sensor.insert(sensor_id.into(), config);
        self
    }

    pub fn with_fallback(mut self, config: DetectorConfig) -> Self {
        self.fallback = Some(config);
        self
    }

    /// Detector configuration for a sensor
    pub fn for_sensor(&self, sensor_id: &str) -> Result<&DetectorConfig> {
        self.by_sensor
            .get(sensor_id)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                DriftError::InvalidConfig(format!(
                    "no detector configured for sensor '{}'",
                    sensor_id
                ))
            })
    }

    /// Build every configured detector once to check its parameters
    pub fn validate(&self) -> Result<()> {
        for config in self.by_sensor.values().chain(self.fallback.iter()) {
            config.build()?;
        }
        Ok(())
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub entity: EntityKind,
    #[serde(default)]
    pub resample: ResampleConfig,
    #[serde(default)]
    pub detectors: DetectorProfiles,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!(
            "loaded configuration from {} ({} sensor profiles)",
            path.as_ref().display(),
            config.detectors.by_sensor.len()
        );
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.entity.validate()?;
        self.resample.validate()?;
        self.detectors.validate()
    }
}
