//! CSV ingestion
//!
//! Input files hold one reading per row after a header line:
//!
//! ```text
//! Time,DeviceId,Sensor,Value
//! 1643879872,f6ce368d7563b285,Temperature,21.4
//! ```
//!
//! A row that does not have exactly four fields, or whose epoch or value do
//! not parse, stops ingestion of that file with
//! [`DriftError::MalformedRecord`]. Rows read before it stay in the registry.
//! [`Ingester::ingest_files`] records the failure and moves on to the next
//! file, so one bad file never aborts a run.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::entity::EntityRegistry;
use crate::error::{DriftError, Result};
use crate::series::from_epoch_secs;

/// Row filters applied while ingesting
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Keep only this sensor
    pub sensor: Option<String>,
    /// Keep only entities whose id ends with one of these suffixes
    pub entity_suffixes: Vec<String>,
}

impl IngestOptions {
    pub fn sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }

    pub fn entity_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.entity_suffixes.push(suffix.into());
        self
    }

    fn accepts(&self, entity_id: &str, sensor_id: &str) -> bool {
        let sensor_ok = self.sensor.as_deref().map_or(true, |s| s == sensor_id);
        let entity_ok = self.entity_suffixes.is_empty()
            || self
                .entity_suffixes
                .iter()
                .any(|suffix| entity_id.ends_with(suffix.as_str()));
        sensor_ok && entity_ok
    }
}

/// A file whose ingestion stopped early
#[derive(Debug)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: DriftError,
}

/// Counters for an ingestion run
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Files fully ingested
    pub files: usize,
    /// Rows stored, including rows from files that later failed
    pub rows: u64,
    /// Well-formed rows dropped by the filters
    pub filtered: u64,
    pub failed_files: Vec<FailedFile>,
}

impl IngestReport {
    pub fn has_failures(&self) -> bool {
        !self.failed_files.is_empty()
    }
}

/// Loads CSV rows into an [`EntityRegistry`]
#[derive(Debug)]
pub struct Ingester {
    registry: EntityRegistry,
    options: IngestOptions,
    report: IngestReport,
}

impl Ingester {
    pub fn new(registry: EntityRegistry, options: IngestOptions) -> Self {
        Self {
            registry,
            options,
            report: IngestReport::default(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    /// Finish ingestion, handing back the populated registry
    pub fn finish(self) -> (EntityRegistry, IngestReport) {
        (self.registry, self.report)
    }

    /// Ingest rows from any reader
    ///
    /// `source` only labels errors and log lines.
    pub fn ingest_reader<R: io::Read>(&mut self, reader: R, source: &Path) -> Result<()> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        for result in csv_reader.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let malformed = |reason: String| DriftError::MalformedRecord {
                path: source.to_path_buf(),
                line,
                reason,
            };

            if record.len() != 4 {
                return Err(malformed(format!(
                    "expected 4 fields, got {}",
                    record.len()
                )));
            }

            let epoch: i64 = record[0]
                .parse()
                .map_err(|_| malformed(format!("invalid epoch '{}'", &record[0])))?;
            let timestamp = from_epoch_secs(epoch)
                .ok_or_else(|| malformed(format!("epoch {} out of range", epoch)))?;
            let entity_id = &record[1];
            let sensor_id = &record[2];
            let value: f64 = record[3]
                .parse()
                .map_err(|_| malformed(format!("invalid value '{}'", &record[3])))?;

            if !self.options.accepts(entity_id, sensor_id) {
                self.report.filtered += 1;
                continue;
            }

            self.registry.add(entity_id, sensor_id, timestamp, value)?;
            self.report.rows += 1;
        }

        Ok(())
    }

    /// Ingest one CSV file
    pub fn ingest_file(&mut self, path: &Path) -> Result<()> {
        log::info!("processing {}", path.display());
        let file = File::open(path)?;
        self.ingest_reader(io::BufReader::new(file), path)?;
        self.report.files += 1;
        Ok(())
    }

    /// Ingest several files, continuing past files that fail
    pub fn ingest_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> &IngestReport {
        for path in paths {
            let path = path.as_ref();
            if let Err(error) = self.ingest_file(path) {
                if error.is_file_scoped() {
                    log::warn!("stopped reading {}: {}", path.display(), error);
                } else {
                    log::error!("failed to ingest {}: {}", path.display(), error);
                }
                self.report.failed_files.push(FailedFile {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
        log::info!(
            "ingested {} rows from {} files ({} filtered, {} failed), {} entities",
            self.report.rows,
            self.report.files,
            self.report.filtered,
            self.report.failed_files.len(),
            self.registry.len()
        );
        &self.report
    }
}

/// All `*.csv` files under `dir`, recursively, in path order
pub fn discover_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let is_csv = entry
            .path()
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if entry.file_type().is_file() && is_csv {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
