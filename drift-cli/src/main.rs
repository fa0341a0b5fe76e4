// sensor-drift CLI - Drift detection over sensor CSV logs
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # sensor-drift
//!
//! Ingests every CSV file under a directory and runs change detection
//! passes over one sensor.
//!
//! ## Usage
//!
//! ```bash
//! # Every device, raw series, HDDM-W for all sensors
//! sensor-drift --detector hddm-w detect --data files_csv --sensor Temperature
//!
//! # One device, EWMA-smoothed then hourly buckets
//! sensor-drift --window 100 --alpha 0.7 --detector hddm-w \
//!     detect --data files_csv --sensor Humidity --entity b285 --mode resampled
//!
//! # Difference between two devices, per-sensor profiles from a file
//! sensor-drift --config drift.json diff --data files_csv --sensor Temperature --a b285 --b 6361
//! ```

mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use run::{CliError, DetectorChoice, Mode, Overrides};
use sensor_drift::IngestOptions;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Sensor drift detection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON engine configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bucket width in seconds for resampled and difference passes
    #[arg(long, global = true)]
    bucket_secs: Option<i64>,

    /// Smooth with EWMA, storing one sample per WINDOW + 1 inputs
    #[arg(long, global = true)]
    window: Option<u32>,

    /// EWMA weight of the newest sample (aggregating entities only)
    #[arg(long, global = true)]
    alpha: Option<f64>,

    /// Detector for sensors without a configured profile
    #[arg(long, global = true, value_enum)]
    detector: Option<DetectorChoice>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect changes on one sensor, per entity
    Detect {
        /// Directory searched recursively for CSV files
        #[arg(short, long)]
        data: PathBuf,

        /// Sensor to analyse
        #[arg(short, long)]
        sensor: String,

        /// Only the entity whose id ends with this suffix
        #[arg(short, long)]
        entity: Option<String>,

        /// Series to feed the detector
        #[arg(short, long, value_enum, default_value_t = Mode::Raw)]
        mode: Mode,
    },

    /// Detect changes on the difference between two entities
    Diff {
        /// Directory searched recursively for CSV files
        #[arg(short, long)]
        data: PathBuf,

        /// Sensor to analyse
        #[arg(short, long)]
        sensor: String,

        /// Id suffix of the reference entity (sets the bucket anchor)
        #[arg(long)]
        a: String,

        /// Id suffix of the subtracted entity
        #[arg(long)]
        b: String,
    },
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(args: Args) -> Result<String, CliError> {
    let overrides = Overrides {
        bucket_secs: args.bucket_secs,
        window: args.window,
        alpha: args.alpha,
        detector: args.detector,
    };
    let config = run::build_config(args.config.as_deref(), &overrides)?;

    let (ingest, passes) = match args.command {
        Command::Detect {
            data,
            sensor,
            entity,
            mode,
        } => {
            let mut options = IngestOptions::default().sensor(sensor.as_str());
            if let Some(suffix) = &entity {
                options = options.entity_suffix(suffix.as_str());
            }
            let (registry, ingest) = run::load_registry(&data, config.entity, options)?;
            let passes = run::detect(&config, &registry, &sensor, entity.as_deref(), mode)?;
            (ingest, passes)
        }
        Command::Diff { data, sensor, a, b } => {
            let options = IngestOptions::default()
                .sensor(sensor.as_str())
                .entity_suffix(a.as_str())
                .entity_suffix(b.as_str());
            let (registry, ingest) = run::load_registry(&data, config.entity, options)?;
            let pass = run::diff(&config, &registry, &sensor, &a, &b)?;
            (ingest, vec![pass])
        }
    };

    if args.json {
        run::render_json(&ingest, &passes)
    } else {
        Ok(run::render_text(&ingest, &passes))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("sensor-drift v{}", env!("CARGO_PKG_VERSION"));

    match execute(args) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
