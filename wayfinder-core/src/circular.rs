//! Circular Quantities
//!
//! Angles that wrap at 360 degrees. Every comparison and arithmetic operator
//! normalizes its operands into `[0, 360)` first, so callers never see
//! negative or out-of-range bearings.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// An angle stored in degrees, with the radian value derived on demand.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircularQuantity {
    degrees: f64,
}

impl CircularQuantity {
    /// Create a quantity from a value in degrees (not normalized)
    pub const fn from_degrees(degrees: f64) -> Self {
        CircularQuantity { degrees }
    }

    /// Create a quantity from a value in radians (not normalized)
    pub fn from_radians(radians: f64) -> Self {
        CircularQuantity {
            degrees: radians.to_degrees(),
        }
    }

    /// Raw value in degrees
    pub fn degrees(&self) -> f64 {
        self.degrees
    }

    /// Raw value in radians
    pub fn radians(&self) -> f64 {
        self.degrees.to_radians()
    }

    /// Map the value into `[0, 360)`.
    ///
    /// Adds the smallest multiple of 360 that makes the value non-negative,
    /// then reduces modulo 360.
    pub fn normalized(&self) -> CircularQuantity {
        let magnitude = self.degrees.abs();
        let turns = if magnitude > 360.0 {
            (magnitude / 360.0).ceil()
        } else {
            1.0
        };

        let mut degrees = (self.degrees + turns * 360.0) % 360.0;
        // Values within one ulp of a full turn round up to exactly 360
        if degrees >= 360.0 {
            degrees = 0.0;
        }
        CircularQuantity { degrees }
    }

    /// Smallest angle between two quantities, in `[0, 180]` degrees.
    pub fn distance_to(&self, other: CircularQuantity) -> f64 {
        let diff = (*self - other).degrees;
        if diff > 180.0 {
            360.0 - diff
        } else {
            diff
        }
    }
}

/// Normalize a raw degree value into `[0, 360)`.
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    CircularQuantity::from_degrees(degrees).normalized().degrees
}

/// Smallest angle between two bearings in degrees, in `[0, 180]`.
#[inline]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    CircularQuantity::from_degrees(a).distance_to(CircularQuantity::from_degrees(b))
}

impl PartialEq for CircularQuantity {
    fn eq(&self, other: &Self) -> bool {
        self.normalized().degrees == other.normalized().degrees
    }
}

impl PartialOrd for CircularQuantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.normalized()
            .degrees
            .partial_cmp(&other.normalized().degrees)
    }
}

impl Add for CircularQuantity {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        let sum = self.normalized().degrees + other.normalized().degrees;
        CircularQuantity::from_degrees(sum).normalized()
    }
}

impl Sub for CircularQuantity {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        let difference = self.normalized().degrees - other.normalized().degrees;
        CircularQuantity::from_degrees(difference).normalized()
    }
}

impl Neg for CircularQuantity {
    type Output = Self;

    fn neg(self) -> Self {
        CircularQuantity::from_degrees(-self.degrees).normalized()
    }
}

impl From<f64> for CircularQuantity {
    fn from(degrees: f64) -> Self {
        CircularQuantity::from_degrees(degrees)
    }
}

impl fmt::Display for CircularQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees)
    }
}
