//! Orientation Settings
//!
//! One settings section per component, all with sensible defaults so a
//! session can be configured from a partial JSON document.

use serde::{Deserialize, Serialize};

use crate::error::{
    validate_distance, validate_duration, validate_multiplier, validate_priority_order,
    validate_window, ConfigError,
};
use crate::heading::HeadingSourceType;

/// Throttling for position-driven recomputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationFilterSettings {
    /// Minimum time between accepted updates in milliseconds
    pub min_time_ms: u64,
    /// Minimum distance between accepted updates in meters
    pub min_distance_m: f64,
}

impl Default for LocationFilterSettings {
    fn default() -> Self {
        LocationFilterSettings {
            min_time_ms: 10_000,  // 10 seconds
            min_distance_m: 50.0,
        }
    }
}

/// Throttling for generators that run asynchronous updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorFilterSettings {
    pub min_time_ms: u64,
    pub min_distance_m: f64,
    /// Distance multiplier applied while travelling in a vehicle
    pub vehicle_multiplier: f64,
}

impl Default for GeneratorFilterSettings {
    fn default() -> Self {
        GeneratorFilterSettings {
            min_time_ms: 5_000,
            min_distance_m: 50.0,
            vehicle_multiplier: 4.0,
        }
    }
}

/// When low-power monitoring hands back to full-resolution tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignificantChangeSettings {
    /// Distance from a point anchor that counts as significant, in meters
    pub radius_m: f64,
}

impl Default for SignificantChangeSettings {
    fn default() -> Self {
        SignificantChangeSettings { radius_m: 40.0 }
    }
}

/// Angular target tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WandSettings {
    /// Continuous focus needed before a long-focus event, in milliseconds
    pub long_focus_ms: u64,
    /// Window used for targets that never report focus, in degrees
    pub unfocusable_window_deg: f64,
}

impl Default for WandSettings {
    fn default() -> Self {
        WandSettings {
            long_focus_ms: 1_000,
            unfocusable_window_deg: 20.0,
        }
    }
}

impl WandSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_duration("wand.longFocusMs", self.long_focus_ms)?;
        validate_window(self.unfocusable_window_deg)?;
        Ok(())
    }
}

/// Haptic/audio beacon feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Total acceptance window in degrees
    pub window_deg: f64,
    /// Offset below which audio plays at full volume, in degrees
    pub silent_distance_deg: f64,
    /// Heading sources to follow, highest priority first
    pub heading_order: Vec<HeadingSourceType>,
}

impl BeaconSettings {
    /// Offset range over which volume falls from 1 to 0
    pub fn max_distance_deg(&self) -> f64 {
        self.window_deg / 2.0 - self.silent_distance_deg
    }
}

impl Default for BeaconSettings {
    fn default() -> Self {
        BeaconSettings {
            window_deg: 60.0,
            silent_distance_deg: 15.0,
            heading_order: vec![HeadingSourceType::Device],
        }
    }
}

/// GPS course gating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseSettings {
    /// Course reported below this speed is ignored (m/s)
    pub min_speed_mps: f64,
    /// Course is dropped when no accepted update arrives for this long
    pub stale_after_ms: u64,
}

impl Default for CourseSettings {
    fn default() -> Self {
        CourseSettings {
            min_speed_mps: 0.4,
            stale_after_ms: 3_000,
        }
    }
}

/// All orientation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrientationConfig {
    pub location_filter: LocationFilterSettings,
    pub generator_filter: GeneratorFilterSettings,
    pub significant_change: SignificantChangeSettings,
    pub wand: WandSettings,
    pub beacon: BeaconSettings,
    pub course: CourseSettings,
}

impl OrientationConfig {
    /// Parse and validate a JSON document. Missing sections use defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: OrientationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for values the components cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_distance("locationFilter.minDistanceM", self.location_filter.min_distance_m)?;
        validate_distance("generatorFilter.minDistanceM", self.generator_filter.min_distance_m)?;
        validate_multiplier(
            "generatorFilter.vehicleMultiplier",
            self.generator_filter.vehicle_multiplier,
        )?;
        validate_distance("significantChange.radiusM", self.significant_change.radius_m)?;

        self.wand.validate()?;

        validate_window(self.beacon.window_deg)?;
        validate_distance("beacon.silentDistanceDeg", self.beacon.silent_distance_deg)?;
        if self.beacon.max_distance_deg() < 0.0 {
            return Err(ConfigError::InvalidDistance {
                name: "beacon.silentDistanceDeg",
                value: self.beacon.silent_distance_deg,
            });
        }
        validate_priority_order(&self.beacon.heading_order)?;

        validate_distance("course.minSpeedMps", self.course.min_speed_mps)?;
        validate_duration("course.staleAfterMs", self.course.stale_after_ms)?;

        Ok(())
    }
}
