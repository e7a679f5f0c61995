//! Time and distance gate for location-driven updates

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::LocationFilterSettings;
use crate::geo::GeoPoint;

/// Marks `previous_elapsed_ms` / `previous_distance_m` before they are known
const NO_PREVIOUS_VALUE: f64 = -1.0;

/// Accepts an update only when the user has moved far enough *and* enough
/// time has passed since the last accepted update.
pub struct LocationUpdateFilter {
    clock: Arc<dyn Clock>,
    min_time_ms: u64,
    min_distance_m: f64,
    previous_time_ms: Option<u64>,
    previous_location: Option<GeoPoint>,
    /// Time between the last two accepted updates
    previous_elapsed_ms: f64,
    /// Distance between the last two accepted updates
    previous_distance_m: f64,
}

impl LocationUpdateFilter {
    pub fn new(clock: Arc<dyn Clock>, settings: &LocationFilterSettings) -> Self {
        LocationUpdateFilter {
            clock,
            min_time_ms: settings.min_time_ms,
            min_distance_m: settings.min_distance_m,
            previous_time_ms: None,
            previous_location: None,
            previous_elapsed_ms: NO_PREVIOUS_VALUE,
            previous_distance_m: NO_PREVIOUS_VALUE,
        }
    }

    /// Whether an update at `location` should go ahead. Does not change state.
    pub fn should_update(&self, location: &GeoPoint) -> bool {
        self.should_update_with(location, self.min_time_ms, self.min_distance_m)
    }

    /// Same as [`should_update`](Self::should_update) with one-off thresholds
    pub fn should_update_with(
        &self,
        location: &GeoPoint,
        min_time_ms: u64,
        min_distance_m: f64,
    ) -> bool {
        let (Some(previous_location), Some(previous_time)) =
            (self.previous_location, self.previous_time_ms)
        else {
            return true;
        };

        let distance = location.distance_to(&previous_location);
        let elapsed = self.clock.now_ms().saturating_sub(previous_time);

        let accept = distance > min_distance_m && elapsed > min_time_ms;
        log::trace!(
            "Location filter: moved {:.1} m in {} ms -> {}",
            distance,
            elapsed,
            if accept { "update" } else { "skip" }
        );
        accept
    }

    /// Record that an update happened at `location`, now
    pub fn update(&mut self, location: GeoPoint) {
        let now = self.clock.now_ms();

        if let Some(previous_time) = self.previous_time_ms {
            self.previous_elapsed_ms = now.saturating_sub(previous_time) as f64;
        }
        if let Some(previous_location) = self.previous_location {
            self.previous_distance_m = previous_location.distance_to(&location);
        }

        self.previous_time_ms = Some(now);
        self.previous_location = Some(location);
    }

    /// Forget all history so the next check passes
    pub fn reset(&mut self) {
        self.previous_time_ms = None;
        self.previous_location = None;
        self.previous_elapsed_ms = NO_PREVIOUS_VALUE;
        self.previous_distance_m = NO_PREVIOUS_VALUE;
    }

    /// True once two updates have been recorded since creation or reset
    pub fn has_previous(&self) -> bool {
        self.previous_elapsed_ms != NO_PREVIOUS_VALUE
            && self.previous_distance_m != NO_PREVIOUS_VALUE
    }

    /// Time between the last two accepted updates, if known
    pub fn previous_elapsed_ms(&self) -> Option<f64> {
        self.has_previous().then_some(self.previous_elapsed_ms)
    }

    /// Distance between the last two accepted updates, if known
    pub fn previous_distance_m(&self) -> Option<f64> {
        self.has_previous().then_some(self.previous_distance_m)
    }
}
