//! Error types for orientation configuration

use thiserror::Error;

use crate::heading::HeadingSourceType;

/// Errors raised when a component is constructed with an invalid configuration.
///
/// Unavailable inputs (no location, no heading) are never errors; they show up
/// as `None` or a no-op instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A heading needs at least one source to fall back on
    #[error("Heading priority order is empty")]
    EmptyPriorityOrder,

    /// Each source may appear at most once in a priority order
    #[error("Heading source {0} appears more than once in the priority order")]
    DuplicateHeadingSource(HeadingSourceType),

    /// Acceptance windows are angular spans in (0, 360] degrees
    #[error("Invalid acceptance window: {0} degrees")]
    InvalidWindow(f64),

    /// A duration setting was zero where a positive value is required
    #[error("Invalid duration for {name}: must be greater than zero")]
    InvalidDuration { name: &'static str },

    /// A distance setting was negative or not finite
    #[error("Invalid distance for {name}: {value}")]
    InvalidDistance { name: &'static str, value: f64 },

    /// A scale factor was not a finite positive number
    #[error("Invalid multiplier for {name}: {value}")]
    InvalidMultiplier { name: &'static str, value: f64 },

    /// Failed to parse a JSON configuration document
    #[error("Configuration parse failed: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Check that an acceptance window is a usable angular span.
pub(crate) fn validate_window(window: f64) -> Result<f64, ConfigError> {
    if window.is_finite() && window > 0.0 && window <= 360.0 {
        Ok(window)
    } else {
        Err(ConfigError::InvalidWindow(window))
    }
}

/// Check that a heading priority order is non-empty and names each source once.
pub(crate) fn validate_priority_order(order: &[HeadingSourceType]) -> Result<(), ConfigError> {
    if order.is_empty() {
        return Err(ConfigError::EmptyPriorityOrder);
    }
    for (i, source) in order.iter().enumerate() {
        if order[..i].contains(source) {
            return Err(ConfigError::DuplicateHeadingSource(*source));
        }
    }
    Ok(())
}

/// Check that a duration setting is non-zero.
pub(crate) fn validate_duration(name: &'static str, ms: u64) -> Result<u64, ConfigError> {
    if ms > 0 {
        Ok(ms)
    } else {
        Err(ConfigError::InvalidDuration { name })
    }
}

/// Check that a scale factor is finite and positive.
pub(crate) fn validate_multiplier(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidMultiplier { name, value })
    }
}

/// Check that a distance setting is finite and non-negative.
pub(crate) fn validate_distance(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidDistance { name, value })
    }
}
