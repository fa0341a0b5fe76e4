//! Detection passes
//!
//! A pass feeds one ordered series through one fresh detector, start to
//! exhaustion, and collects what the detector signalled. Input order is
//! checked before anything is fed: change detectors are causal, so a series
//! that is not strictly ascending in time is rejected outright rather than
//! fed partially.
//!
//! The [`Orchestrator`] picks the detector for a sensor from its
//! [`DetectorProfiles`] and prepares the series for each kind of pass:
//! stored (raw or smoothed), resampled, or the difference of two entities.
//! Passes never share detector state.

use serde::{Deserialize, Serialize};

use crate::config::{DetectorProfiles, ResampleConfig};
use crate::detector::ChangeDetector;
use crate::entity::{Entity, EntityRegistry};
use crate::error::{DriftError, Result};
use crate::resample::{difference, resample_sensor};
use crate::series::{Observation, Timestamp};

/// A value at which the detector signalled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    /// Position in the source series (bucket index for resampled input)
    pub index: usize,
    pub timestamp: Timestamp,
    pub value: f64,
}

impl From<&Observation> for AnomalyRecord {
    fn from(obs: &Observation) -> Self {
        Self {
            index: obs.index,
            timestamp: obs.timestamp,
            value: obs.value,
        }
    }
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Detector algorithm name
    pub detector: String,
    /// Changes, in feed order
    pub anomalies: Vec<AnomalyRecord>,
    /// Values that left the detector in its warning zone, in feed order
    pub warnings: Vec<AnomalyRecord>,
    /// Values fed to the detector
    pub fed: usize,
    /// Buckets not fed because they were missing or unmatched
    pub skipped: usize,
    /// Raw samples earlier than the bucket anchor, left out of every bucket
    pub before_anchor: usize,
}

/// Check that timestamps are strictly ascending
pub fn check_ascending(observations: &[Observation]) -> Result<()> {
    for (i, pair) in observations.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(DriftError::OutOfOrder {
                index: i + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// Feed `observations` through `detector`
///
/// The detector is never reset; continuing after a change is up to the
/// detector itself. On a detector failure the anomalies collected so far are
/// discarded and their number is reported in [`DriftError::Detector`].
pub fn run_pass(
    detector: &mut dyn ChangeDetector,
    observations: &[Observation],
) -> Result<PassReport> {
    check_ascending(observations)?;

    let mut report = PassReport {
        detector: detector.name().to_string(),
        ..Default::default()
    };

    for obs in observations {
        detector
            .add_element(obs.value)
            .map_err(|source| DriftError::Detector {
                index: obs.index,
                anomalies_before: report.anomalies.len(),
                source,
            })?;
        report.fed += 1;

        if detector.detected_warning_zone() {
            log::debug!("warning zone at index {} ({})", obs.index, obs.timestamp);
            report.warnings.push(obs.into());
        }
        if detector.detected_change() {
            log::debug!(
                "change detected at index {} ({}, value {})",
                obs.index,
                obs.timestamp,
                obs.value
            );
            report.anomalies.push(obs.into());
        }
    }

    Ok(report)
}

/// Which series of an entity a pass consumes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionMode {
    /// Stored series as-is (smoothed for aggregating entities)
    Raw,
    /// Bucket averages on the given grid; missing buckets are skipped
    Resampled(ResampleConfig),
}

/// Result of one entity's pass in [`Orchestrator::run_all`]
#[derive(Debug)]
pub struct EntityPass {
    pub entity: String,
    pub result: Result<PassReport>,
}

/// Runs detection passes with per-sensor detector profiles
#[derive(Debug, Clone, Default)]
pub struct Orchestrator {
    profiles: DetectorProfiles,
}

impl Orchestrator {
    pub fn new(profiles: DetectorProfiles) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &DetectorProfiles {
        &self.profiles
    }

    fn detector_for(&self, sensor_id: &str) -> Result<Box<dyn ChangeDetector>> {
        self.profiles.for_sensor(sensor_id)?.build()
    }

    fn finish(&self, label: &str, sensor_id: &str, report: &PassReport) {
        log::info!(
            "{} / {}: fed {} values, {} changes, {} warnings, {} skipped, {} before anchor ({})",
            label,
            sensor_id,
            report.fed,
            report.anomalies.len(),
            report.warnings.len(),
            report.skipped,
            report.before_anchor,
            report.detector
        );
    }

    /// Pass over the stored series of one sensor
    pub fn run_series(&self, entity: &Entity, sensor_id: &str) -> Result<PassReport> {
        let series = entity.store().series(sensor_id)?;
        let mut detector = self.detector_for(sensor_id)?;

        let observations: Vec<Observation> = series.observations().collect();
        let report = run_pass(detector.as_mut(), &observations)?;
        self.finish(entity.id(), sensor_id, &report);
        Ok(report)
    }

    /// Pass over the resampled series of one sensor
    pub fn run_resampled(
        &self,
        entity: &Entity,
        sensor_id: &str,
        grid: &ResampleConfig,
    ) -> Result<PassReport> {
        let resampled = resample_sensor(entity.store(), sensor_id, grid.width(), grid.anchor()?)?;
        let mut detector = self.detector_for(sensor_id)?;

        let observations: Vec<Observation> = resampled.observations().collect();
        let mut report = run_pass(detector.as_mut(), &observations)?;
        report.skipped = resampled.missing_count();
        report.before_anchor = resampled.before_anchor();
        self.finish(entity.id(), sensor_id, &report);
        Ok(report)
    }

    /// Pass over `a - b` on a common bucket grid
    ///
    /// Without an explicit anchor, both sides are resampled from entity
    /// `a`'s first timestamp.
    pub fn run_difference(
        &self,
        a: &Entity,
        b: &Entity,
        sensor_id: &str,
        grid: &ResampleConfig,
    ) -> Result<PassReport> {
        let anchor = match grid.anchor()? {
            Some(anchor) => anchor,
            None => a.store().min_timestamp(sensor_id)?,
        };
        let width = grid.width();
        let ra = resample_sensor(a.store(), sensor_id, width, Some(anchor))?;
        let rb = resample_sensor(b.store(), sensor_id, width, Some(anchor))?;
        let diff = difference(&ra, &rb)?;

        let mut detector = self.detector_for(sensor_id)?;
        let mut report = run_pass(detector.as_mut(), diff.points())?;
        report.skipped = diff.skipped() + diff.unmatched();
        report.before_anchor = ra.before_anchor() + rb.before_anchor();
        self.finish(&format!("{} - {}", a.id(), b.id()), sensor_id, &report);
        Ok(report)
    }

    /// One independent pass per entity holding `sensor_id`, in registry order
    pub fn run_all(
        &self,
        registry: &EntityRegistry,
        sensor_id: &str,
        mode: DetectionMode,
    ) -> Vec<EntityPass> {
        registry
            .iter()
            .filter(|(_, entity)| entity.store().has(sensor_id))
            .map(|(_, entity)| {
                let result = match mode {
                    DetectionMode::Raw => self.run_series(entity, sensor_id),
                    DetectionMode::Resampled(grid) => {
                        self.run_resampled(entity, sensor_id, &grid)
                    }
                };
                if let Err(e) = &result {
                    log::warn!("pass for {} / {} failed: {}", entity.id(), sensor_id, e);
                }
                EntityPass {
                    entity: entity.id().to_string(),
                    result,
                }
            })
            .collect()
    }
}
