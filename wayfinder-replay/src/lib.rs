//! # Wayfinder Replay
//!
//! Replays a recorded sensor trace through a `wayfinder-core` beacon session
//! and writes what the haptic and audio renderers were asked to do as JSON
//! lines. Time is simulated, so a replay is fully deterministic.
//!
//! ```text
//!  scenario.json ──▶ Scenario ──▶ replay() ──▶ Vec<Record> ──▶ JSON lines
//!                                   │
//!                     LocationFeed / HeadingFeed / MotionFeed
//!                                   │
//!                              BeaconDriver
//! ```
//!
//! ## Usage
//!
//! ```text
//! wayfinder-replay session.json             # records to stdout
//! wayfinder-replay session.json -o out.jsonl
//! wayfinder-replay session.json -c config.json -v
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;
use wayfinder_core::{ConfigError, OrientationConfig, WandEvent};

pub mod record;
pub mod runner;
pub mod scenario;

pub use record::{HapticAction, Record};
pub use runner::replay;
pub use scenario::{Input, Scenario, Step};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Orientation settings (JSON), replacing the scenario's own
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write records to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write records: {0}")]
    Write(#[from] io::Error),

    #[error("Invalid scenario: {0}")]
    Scenario(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Step {index} at {at_ms} ms is earlier than the previous step at {previous_ms} ms")]
    OutOfOrder {
        index: usize,
        at_ms: u64,
        previous_ms: u64,
    },
}

/// Totals for one replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub steps: usize,
    pub records: usize,
    pub focus_gained: usize,
    pub haptic_pulses: usize,
}

impl Summary {
    fn from_records(steps: usize, records: &[Record]) -> Self {
        let mut summary = Summary {
            steps,
            records: records.len(),
            ..Default::default()
        };
        for record in records {
            match record {
                Record::Wand {
                    event: WandEvent::FocusGained { .. },
                    ..
                } => summary.focus_gained += 1,
                Record::Haptic {
                    action: HapticAction::Trigger,
                    ..
                } => summary.haptic_pulses += 1,
                _ => {}
            }
        }
        summary
    }
}

/// Write records as one JSON object per line
pub fn write_records<W: Write>(out: W, records: &[Record]) -> Result<(), ReplayError> {
    let mut out = BufWriter::new(out);
    for record in records {
        serde_json::to_writer(&mut out, record).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Load the scenario named on the command line, replay it and write the records
pub fn run(cli: &Cli) -> Result<Summary, ReplayError> {
    let mut scenario = Scenario::load(&cli.scenario)?;

    if let Some(path) = &cli.config {
        let json = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.display().to_string(),
            source,
        })?;
        scenario.config = OrientationConfig::from_json(&json)?;
        log::debug!("Using settings from {}", path.display());
    }

    log::info!(
        "Replaying {} step(s) from {}",
        scenario.steps.len(),
        cli.scenario.display()
    );
    let records = replay(&scenario)?;

    match &cli.output {
        Some(path) => write_records(File::create(path)?, &records)?,
        None => write_records(io::stdout().lock(), &records)?,
    }

    Ok(Summary::from_records(scenario.steps.len(), &records))
}
