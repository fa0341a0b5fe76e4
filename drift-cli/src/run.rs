// sensor-drift CLI - Run execution
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Loading, ingestion and detection passes behind the CLI subcommands.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use sensor_drift::{
    discover_files, DetectionMode, DetectorConfig, DriftError, EngineConfig, EntityKind,
    EntityRegistry, HddmWConfig, IngestOptions, IngestReport, Ingester, Orchestrator,
    PageHinkleyConfig, PassReport,
};
use serde::Serialize;
use tracing::{info, warn};

/// CLI errors.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error("No CSV files found under {}", .0.display())]
    NoInput(PathBuf),

    #[error("No entity id ends with '{0}'")]
    EntityNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Series consumed by `detect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Mode {
    /// Stored series (smoothed when --window is set)
    #[default]
    Raw,
    /// Bucket averages
    Resampled,
}

/// Detector used for sensors without a configured profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DetectorChoice {
    HddmW,
    PageHinkley,
}

impl DetectorChoice {
    fn config(self) -> DetectorConfig {
        match self {
            Self::HddmW => DetectorConfig::HddmW(HddmWConfig::default()),
            Self::PageHinkley => DetectorConfig::PageHinkley(PageHinkleyConfig::default()),
        }
    }
}

/// Command-line values layered over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub bucket_secs: Option<i64>,
    pub window: Option<u32>,
    pub alpha: Option<f64>,
    pub detector: Option<DetectorChoice>,
}

/// Load the engine configuration and apply overrides.
pub fn build_config(path: Option<&Path>, overrides: &Overrides) -> Result<EngineConfig, CliError> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(secs) = overrides.bucket_secs {
        config.resample.bucket_width_secs = secs;
    }
    match (overrides.window, overrides.alpha, &mut config.entity) {
        (Some(window), alpha, entity) => {
            let alpha = match (alpha, *entity) {
                (Some(alpha), _) => alpha,
                (None, EntityKind::Aggregating { downsample }) => downsample.alpha,
                (None, EntityKind::Raw) => sensor_drift::DownsampleConfig::default().alpha,
            };
            *entity = EntityKind::aggregating(window, alpha);
        }
        (None, Some(alpha), EntityKind::Aggregating { downsample }) => {
            downsample.alpha = alpha;
        }
        (None, Some(_), EntityKind::Raw) => {
            warn!("--alpha has no effect on raw entities without --window");
        }
        (None, None, _) => {}
    }
    if let Some(choice) = overrides.detector {
        config.detectors.fallback = Some(choice.config());
    }

    config.validate()?;
    Ok(config)
}

/// Ingestion counters as printed.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub files: usize,
    pub rows: u64,
    pub filtered: u64,
    pub entities: usize,
    pub failed: Vec<FailedSummary>,
}

#[derive(Debug, Serialize)]
pub struct FailedSummary {
    pub path: PathBuf,
    pub error: String,
}

impl IngestSummary {
    fn new(report: &IngestReport, registry: &EntityRegistry) -> Self {
        Self {
            files: report.files,
            rows: report.rows,
            filtered: report.filtered,
            entities: registry.len(),
            failed: report
                .failed_files
                .iter()
                .map(|f| FailedSummary {
                    path: f.path.clone(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

/// Discover and ingest every CSV file under `data`.
pub fn load_registry(
    data: &Path,
    kind: EntityKind,
    options: IngestOptions,
) -> Result<(EntityRegistry, IngestSummary), CliError> {
    let files = discover_files(data)?;
    if files.is_empty() {
        return Err(CliError::NoInput(data.to_path_buf()));
    }
    info!("Found {} CSV files under {}", files.len(), data.display());

    let mut ingester = Ingester::new(EntityRegistry::new(kind)?, options);
    ingester.ingest_files(&files);
    let (registry, report) = ingester.finish();
    let summary = IngestSummary::new(&report, &registry);
    Ok((registry, summary))
}

/// Outcome of one pass as printed.
#[derive(Debug, Serialize)]
pub struct PassSummary {
    pub label: String,
    pub sensor: String,
    pub mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PassReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn find_entity<'r>(
    registry: &'r EntityRegistry,
    suffix: &str,
) -> Result<&'r sensor_drift::Entity, CliError> {
    let id = registry
        .find_by_suffix(suffix)
        .ok_or_else(|| CliError::EntityNotFound(suffix.to_string()))?;
    Ok(registry.get(id)?)
}

/// Run `detect` for one entity (by id suffix) or for every entity.
pub fn detect(
    config: &EngineConfig,
    registry: &EntityRegistry,
    sensor: &str,
    entity: Option<&str>,
    mode: Mode,
) -> Result<Vec<PassSummary>, CliError> {
    let orchestrator = Orchestrator::new(config.detectors.clone());
    let (mode_name, detection) = match mode {
        Mode::Raw => ("raw", DetectionMode::Raw),
        Mode::Resampled => ("resampled", DetectionMode::Resampled(config.resample)),
    };

    if let Some(suffix) = entity {
        let entity = find_entity(registry, suffix)?;
        let report = match detection {
            DetectionMode::Raw => orchestrator.run_series(entity, sensor)?,
            DetectionMode::Resampled(grid) => orchestrator.run_resampled(entity, sensor, &grid)?,
        };
        return Ok(vec![PassSummary {
            label: entity.id().to_string(),
            sensor: sensor.to_string(),
            mode: mode_name,
            report: Some(report),
            error: None,
        }]);
    }

    // Resolve the profile up front so a missing one fails the run, not every pass
    config.detectors.for_sensor(sensor)?;

    Ok(orchestrator
        .run_all(registry, sensor, detection)
        .into_iter()
        .map(|pass| {
            let (report, error) = match pass.result {
                Ok(report) => (Some(report), None),
                Err(e) => (None, Some(e.to_string())),
            };
            PassSummary {
                label: pass.entity,
                sensor: sensor.to_string(),
                mode: mode_name,
                report,
                error,
            }
        })
        .collect())
}

/// Run `diff` between two entities found by id suffix.
pub fn diff(
    config: &EngineConfig,
    registry: &EntityRegistry,
    sensor: &str,
    a: &str,
    b: &str,
) -> Result<PassSummary, CliError> {
    let entity_a = find_entity(registry, a)?;
    let entity_b = find_entity(registry, b)?;

    let orchestrator = Orchestrator::new(config.detectors.clone());
    let report = orchestrator.run_difference(entity_a, entity_b, sensor, &config.resample)?;

    Ok(PassSummary {
        label: format!("{} - {}", entity_a.id(), entity_b.id()),
        sensor: sensor.to_string(),
        mode: "difference",
        report: Some(report),
        error: None,
    })
}

/// Combined JSON document.
#[derive(Debug, Serialize)]
pub struct Output<'a> {
    pub ingest: &'a IngestSummary,
    pub passes: &'a [PassSummary],
}

pub fn render_json(ingest: &IngestSummary, passes: &[PassSummary]) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(&Output { ingest, passes })?)
}

pub fn render_text(ingest: &IngestSummary, passes: &[PassSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Ingested {} rows from {} files ({} filtered), {} entities",
        ingest.rows, ingest.files, ingest.filtered, ingest.entities
    );
    for failed in &ingest.failed {
        let _ = writeln!(out, "  ISSUE: {}: {}", failed.path.display(), failed.error);
    }

    for pass in passes {
        match (&pass.report, &pass.error) {
            (Some(report), _) => {
                let _ = writeln!(
                    out,
                    "{} {} [{}, {}]: fed {}, skipped {}, {} before anchor, {} changes, {} warnings",
                    pass.label,
                    pass.sensor,
                    pass.mode,
                    report.detector,
                    report.fed,
                    report.skipped,
                    report.before_anchor,
                    report.anomalies.len(),
                    report.warnings.len()
                );
                for anomaly in &report.anomalies {
                    let _ = writeln!(
                        out,
                        "  change at #{} {} value {:.4}",
                        anomaly.index,
                        anomaly.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        anomaly.value
                    );
                }
            }
            (None, Some(error)) => {
                let _ = writeln!(out, "{} {} [{}]: FAILED: {}", pass.label, pass.sensor, pass.mode, error);
            }
            (None, None) => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_dataset(dir: &Path) {
        let mut content = String::from("Time,DeviceId,Sensor,Value\n");
        for i in 0..300 {
            let a = if i < 200 { 20.2 } else { 21.0 };
            content.push_str(&format!("{},f6ce368d7563b285,Temperature,{}\n", i * 60, a));
            content.push_str(&format!("{},f6ce36f0118e6361,Temperature,20.0\n", i * 60));
        }
        fs::write(dir.join("week1.csv"), content).unwrap();
        fs::write(dir.join("week2.csv"), "Time,DeviceId,Sensor,Value\n0,x,Temperature\n").unwrap();
    }

    fn hddm_overrides() -> Overrides {
        Overrides {
            bucket_secs: Some(60),
            detector: Some(DetectorChoice::HddmW),
            ..Default::default()
        }
    }

    #[test]
    fn test_overrides_applied() {
        let overrides = Overrides {
            bucket_secs: Some(600),
            window: Some(10),
            alpha: Some(0.5),
            detector: Some(DetectorChoice::PageHinkley),
        };
        let config = build_config(None, &overrides).unwrap();
        assert_eq!(config.resample.bucket_width_secs, 600);
        assert_eq!(config.entity, EntityKind::aggregating(10, 0.5));
        assert_eq!(
            config.detectors.for_sensor("Anything").unwrap().algorithm(),
            "page_hinkley"
        );
    }

    #[test]
    fn test_alpha_applies_to_configured_aggregation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drift.json");
        fs::write(
            &path,
            r#"{ "entity": { "kind": "aggregating", "window": 25, "alpha": 0.7 } }"#,
        )
        .unwrap();

        let overrides = Overrides {
            alpha: Some(0.3),
            ..Default::default()
        };
        let config = build_config(Some(path.as_path()), &overrides).unwrap();
        assert_eq!(config.entity, EntityKind::aggregating(25, 0.3));

        let raw = build_config(None, &overrides).unwrap();
        assert_eq!(raw.entity, EntityKind::Raw);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = Overrides {
            window: Some(10),
            alpha: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            build_config(None, &overrides),
            Err(CliError::Drift(DriftError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_detect_all_and_diff() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());

        let config = build_config(None, &hddm_overrides()).unwrap();
        let options = IngestOptions::default().sensor("Temperature");
        let (registry, ingest) = load_registry(dir.path(), config.entity, options).unwrap();
        assert_eq!(ingest.files, 1);
        assert_eq!(ingest.failed.len(), 1);
        assert_eq!(ingest.entities, 2);

        let passes = detect(&config, &registry, "Temperature", None, Mode::Resampled).unwrap();
        assert_eq!(passes.len(), 2);
        assert!(passes.iter().all(|p| p.error.is_none()));

        let summary = diff(&config, &registry, "Temperature", "b285", "6361").unwrap();
        let report = summary.report.as_ref().unwrap();
        assert_eq!(report.fed, 300);
        assert_eq!(report.anomalies.len(), 1);

        let text = render_text(&ingest, std::slice::from_ref(&summary));
        assert!(text.contains("f6ce368d7563b285 - f6ce36f0118e6361"));
        assert!(text.contains("0 before anchor"));
        assert!(text.contains("ISSUE"));

        let json = render_json(&ingest, &[summary]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["passes"][0]["report"]["fed"], 300);
    }

    #[test]
    fn test_unknown_entity_and_missing_profile() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());

        let config = build_config(None, &Overrides::default()).unwrap();
        let (registry, _) =
            load_registry(dir.path(), config.entity, IngestOptions::default()).unwrap();

        assert!(matches!(
            detect(&config, &registry, "Temperature", Some("zzzz"), Mode::Raw),
            Err(CliError::EntityNotFound(_))
        ));
        assert!(matches!(
            detect(&config, &registry, "Temperature", None, Mode::Raw),
            Err(CliError::Drift(DriftError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_registry(dir.path(), EntityKind::Raw, IngestOptions::default()),
            Err(CliError::NoInput(_))
        ));
    }
}
