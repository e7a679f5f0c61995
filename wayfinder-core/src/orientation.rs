//! Things that have a direction from the user
//!
//! An [`Orientable`] reports a live bearing. [`BeaconOrientation`] is the
//! common case: the bearing from the user's current position to a fixed
//! location, kept fresh by following position updates.

use std::sync::{Arc, Mutex};

use crate::geo::GeoPoint;
use crate::sensors::LocationProvider;
use crate::signal::{lock, Subscription};

/// Anything with a current bearing from the user, in degrees `[0, 360)`
pub trait Orientable: Send + Sync {
    fn bearing(&self) -> f64;
}

/// A direction that never changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedBearing(pub f64);

impl Orientable for FixedBearing {
    fn bearing(&self) -> f64 {
        crate::circular::normalize_degrees(self.0)
    }
}

/// Live bearing towards a fixed location.
///
/// The position subscription is held for the lifetime of the value and
/// released when it is dropped.
pub struct BeaconOrientation {
    target: GeoPoint,
    current: Arc<Mutex<GeoPoint>>,
    _subscription: Subscription,
}

impl BeaconOrientation {
    /// Returns `None` when the provider has no current position.
    pub fn new(target: GeoPoint, provider: &dyn LocationProvider) -> Option<Self> {
        let Some(initial) = provider.current_location() else {
            log::debug!("No current location, cannot orient towards {:?}", target);
            return None;
        };

        let current = Arc::new(Mutex::new(initial));
        let current_cb = current.clone();
        let subscription =
            provider.on_location_change(Arc::new(move |location: &Option<GeoPoint>| {
                // Keep the last known position when the fix is lost
                if let Some(location) = location {
                    *lock(&current_cb) = *location;
                }
            }));

        Some(BeaconOrientation {
            target,
            current,
            _subscription: subscription,
        })
    }

    pub fn target(&self) -> GeoPoint {
        self.target
    }

    /// Position the bearing is currently computed from
    pub fn current_location(&self) -> GeoPoint {
        *lock(&self.current)
    }

    /// Distance to the target in meters
    pub fn distance(&self) -> f64 {
        self.current_location().distance_to(&self.target)
    }
}

impl Orientable for BeaconOrientation {
    fn bearing(&self) -> f64 {
        self.current_location().bearing_to(&self.target)
    }
}
