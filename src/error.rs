//! Error types for sensor-drift
//!
//! This module defines all error types used throughout the library.

use std::path::PathBuf;

use thiserror::Error;

use crate::series::Timestamp;

/// Result type alias for sensor-drift operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Main error type for sensor-drift operations
#[derive(Error, Debug)]
pub enum DriftError {
    /// Entity or sensor absent on read
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resampling a sensor series with zero samples
    ///
    /// `sensor` is set when the series was looked up by sensor id.
    #[error(
        "Empty series{}",
        sensor.as_deref().map(|s| format!(" for sensor {}", s)).unwrap_or_default()
    )]
    EmptySeries { sensor: Option<String> },

    /// Ingestion row shape or type violation (fatal to the current file)
    #[error("Malformed record in {} at line {line}: {reason}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Failure raised by the change detector, fatal to the current pass
    #[error("Detector failed at index {index} ({anomalies_before} anomalies discarded): {source}")]
    Detector {
        index: usize,
        anomalies_before: usize,
        #[source]
        source: DetectorError,
    },

    /// Pass input is not in strictly ascending timestamp order
    #[error("Out of order input at index {index}: {current} does not follow {previous}")]
    OutOfOrder {
        index: usize,
        previous: Timestamp,
        current: Timestamp,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON configuration error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriftError {
    /// Build a [`DriftError::NotFound`] for a sensor of an entity
    pub fn sensor_not_found(entity: &str, sensor: &str) -> Self {
        Self::NotFound(format!("sensor '{}' on entity '{}'", sensor, entity))
    }

    /// Whether this error is scoped to a single input file
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::Io(_) | Self::Csv(_)
        )
    }
}

/// Errors raised by change detectors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Value is not a valid number (NaN, Inf)
    #[error("Non-finite input: {0}")]
    NonFiniteInput(f64),

    /// Detector-specific failure
    #[error("{detector}: {reason}")]
    Failed { detector: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DriftError::MalformedRecord {
            path: PathBuf::from("week1.csv"),
            line: 12,
            reason: "expected 4 fields, got 3".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("week1.csv"));
        assert!(msg.contains("line 12"));
        assert!(err.is_file_scoped());
    }

    #[test]
    fn test_detector_error_wrapping() {
        let err = DriftError::Detector {
            index: 7,
            anomalies_before: 2,
            source: DetectorError::NonFiniteInput(f64::NAN),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("index 7"));
        assert!(msg.contains("Non-finite"));
        assert!(!err.is_file_scoped());
    }

    #[test]
    fn test_empty_series_display() {
        let named = DriftError::EmptySeries {
            sensor: Some("Gas".to_string()),
        };
        assert_eq!(format!("{}", named), "Empty series for sensor Gas");
        let anonymous = DriftError::EmptySeries { sensor: None };
        assert_eq!(format!("{}", anonymous), "Empty series");
    }

    #[test]
    fn test_sensor_not_found() {
        let err = DriftError::sensor_not_found("f6ce368d7563b285", "Humidity");
        assert!(matches!(err, DriftError::NotFound(_)));
        assert!(format!("{}", err).contains("Humidity"));
    }
}
