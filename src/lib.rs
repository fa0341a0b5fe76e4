//! # sensor-drift
//!
//! Turns time-stamped readings from fleets of multi-sensor devices into
//! denoised, time-aligned series and runs sequential change ("drift")
//! detectors over them, per device or over the difference between two
//! devices.
//!
//! ## Key Features
//!
//! - **EWMA downsampling**: bounded memory for high-rate sensors
//! - **Gap-aware resampling**: fixed-width bucket averages, empty buckets marked
//!   as missing instead of zero
//! - **Pluggable detectors**: HDDM-W and Page-Hinkley behind one small trait,
//!   chosen per sensor by configuration
//! - **File-scoped ingestion**: one malformed CSV never aborts a run
//!
//! ## Quick Start
//!
//! ```rust
//! use sensor_drift::{
//!     DetectorConfig, DetectorProfiles, EntityRegistry, HddmWConfig, Orchestrator,
//!     ResampleConfig,
//! };
//! use sensor_drift::series::from_epoch_secs;
//!
//! let mut registry = EntityRegistry::raw();
//! for (t, v) in [(0, 10.0), (3600, 12.0), (7200, 50.0)] {
//!     registry.add("d1", "T", from_epoch_secs(t).unwrap(), v).unwrap();
//! }
//!
//! let profiles = DetectorProfiles::new()
//!     .with_sensor("T", DetectorConfig::HddmW(HddmWConfig::default()));
//! let orchestrator = Orchestrator::new(profiles);
//!
//! let device = registry.by_name("d1").unwrap();
//! let report = orchestrator
//!     .run_resampled(device, "T", &ResampleConfig::new(3600).with_anchor(0))
//!     .unwrap();
//! assert_eq!(report.fed, 3);
//! assert_eq!(report.skipped, 0);
//! ```
//!
//! ## Modules
//!
//! - [`series`]: Timestamps, samples and ordered sensor series
//! - [`store`]: Per-entity sensor storage
//! - [`ewma`]: Smoothing downsampler
//! - [`entity`]: Entities and the entity registry
//! - [`resample`]: Bucket resampling and differencing
//! - [`detector`]: Change detector trait and variants
//! - [`orchestrator`]: Detection passes
//! - [`ingest`]: CSV ingestion
//! - [`config`]: Engine configuration

// Modules
pub mod config;
pub mod detector;
pub mod entity;
pub mod error;
pub mod ewma;
pub mod ingest;
pub mod orchestrator;
pub mod resample;
pub mod series;
pub mod store;

// Re-exports for convenient access
pub use config::{DetectorProfiles, EngineConfig, ResampleConfig};
pub use detector::{
    ChangeDetector, DetectorConfig, HddmW, HddmWConfig, PageHinkley, PageHinkleyConfig,
};
pub use entity::{Entity, EntityId, EntityKind, EntityRegistry};
pub use error::{DetectorError, DriftError, Result};
pub use ewma::{DownsampleConfig, EwmaDownsampler};
pub use ingest::{discover_files, FailedFile, IngestOptions, IngestReport, Ingester};
pub use orchestrator::{
    run_pass, AnomalyRecord, DetectionMode, EntityPass, Orchestrator, PassReport,
};
pub use resample::{difference, resample, BucketValue, DifferenceSeries, ResampledSeries};
pub use series::{Observation, Sample, SensorSeries, Timestamp};
pub use store::TimeSeriesStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
