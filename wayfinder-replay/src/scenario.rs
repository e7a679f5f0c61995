//! Recorded sensor traces
//!
//! A scenario is a JSON document describing one beacon session: where the
//! user starts, where the beacon is, and a time-ordered list of sensor inputs.
//!
//! ```json
//! {
//!   "beacon": { "latitude": 47.6205, "longitude": -122.3480 },
//!   "start": { "latitude": 47.6205, "longitude": -122.3493 },
//!   "flat": true,
//!   "steps": [
//!     { "atMs": 0, "input": "heading", "source": "device", "value": 0.0 },
//!     { "atMs": 100, "input": "heading", "source": "device", "value": 90.0 },
//!     { "atMs": 1500, "input": "tick" },
//!     { "atMs": 2000, "input": "flat", "flat": false }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use wayfinder_core::{GeoPoint, HeadingSourceType, OrientationConfig, Region};

use crate::ReplayError;

/// One sensor input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "camelCase")]
pub enum Input {
    /// Reading (or loss of reading) from one heading source
    Heading {
        source: HeadingSourceType,
        value: Option<f64>,
        #[serde(default)]
        accuracy: Option<f64>,
    },
    /// Raw GPS course, gated by the course filter
    Course {
        value: Option<f64>,
        #[serde(default)]
        accuracy: Option<f64>,
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Whether the user is walking
    Motion {
        #[serde(rename = "inMotion")]
        in_motion: bool,
    },
    /// New position (or loss of fix)
    Location { position: Option<GeoPoint> },
    /// Phone held flat or not
    Flat { flat: bool },
    /// Nothing changes; only time advances
    Tick,
    /// End the beacon session early
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Milliseconds since the start of the trace
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: Input,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Session settings; missing sections use defaults
    #[serde(default)]
    pub config: OrientationConfig,
    pub beacon: GeoPoint,
    /// User position when the session starts
    #[serde(default)]
    pub start: Option<GeoPoint>,
    /// Whether the phone starts out flat
    #[serde(default)]
    pub flat: bool,
    /// Points of interest for significant-change monitoring
    #[serde(default)]
    pub regions: Vec<Region>,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse and validate a scenario document
    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let scenario: Scenario = serde_json::from_str(json)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let json = fs::read_to_string(path).map_err(|source| ReplayError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), ReplayError> {
        self.config.validate()?;

        let mut previous = 0;
        for (index, step) in self.steps.iter().enumerate() {
            if step.at_ms < previous {
                return Err(ReplayError::OutOfOrder {
                    index,
                    at_ms: step.at_ms,
                    previous_ms: previous,
                });
            }
            previous = step.at_ms;
        }
        Ok(())
    }
}
