//! Update gate for generators whose updates complete asynchronously

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::GeneratorFilterSettings;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Snapshot {
    location: GeoPoint,
    time_ms: u64,
}

/// Like [`LocationUpdateFilter`](super::LocationUpdateFilter) but aware of an
/// update that is still running, and of vehicle travel.
///
/// ```text
///  should_update ──▶ begin_update ──▶ finish_update(success)
///                         │                  │
///                   (in flight: all     (commit snapshot only
///                    checks fail)         on success)
/// ```
pub struct GeneratorUpdateFilter {
    clock: Arc<dyn Clock>,
    settings: GeneratorFilterSettings,
    in_vehicle: bool,
    in_flight: Option<GeoPoint>,
    last_update: Option<Snapshot>,
}

impl GeneratorUpdateFilter {
    pub fn new(clock: Arc<dyn Clock>, settings: GeneratorFilterSettings) -> Self {
        GeneratorUpdateFilter {
            clock,
            settings,
            in_vehicle: false,
            in_flight: None,
            last_update: None,
        }
    }

    /// Scale the distance threshold while the user is in a vehicle
    pub fn set_in_vehicle(&mut self, in_vehicle: bool) {
        self.in_vehicle = in_vehicle;
    }

    pub fn is_updating(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn should_update(&self, location: &GeoPoint) -> bool {
        if self.in_flight.is_some() {
            return false;
        }

        let Some(last) = self.last_update else {
            return true;
        };

        let multiplier = if self.in_vehicle {
            self.settings.vehicle_multiplier
        } else {
            1.0
        };

        let distance_ok =
            location.distance_to(&last.location) > self.settings.min_distance_m * multiplier;
        let time_ok =
            self.clock.now_ms().saturating_sub(last.time_ms) > self.settings.min_time_ms;

        distance_ok && time_ok
    }

    /// Mark an update as started at `location`
    pub fn begin_update(&mut self, location: GeoPoint) {
        self.in_flight = Some(location);
    }

    /// Mark the running update as finished. Only a successful update moves the
    /// reference point; either way the filter stops reporting "in flight".
    pub fn finish_update(&mut self, success: bool) {
        let Some(location) = self.in_flight.take() else {
            log::warn!("Generator update finished without a matching begin");
            return;
        };

        if success {
            self.last_update = Some(Snapshot {
                location,
                time_ms: self.clock.now_ms(),
            });
        }
    }

    /// Begin and finish in one step, for updates that complete synchronously
    pub fn did_update(&mut self, location: GeoPoint, success: bool) {
        self.begin_update(location);
        self.finish_update(success);
    }

    pub fn reset(&mut self) {
        self.in_flight = None;
        self.last_update = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: GeoPoint = GeoPoint::new(51.5007, -0.1246);

    fn setup() -> (Arc<ManualClock>, GeneratorUpdateFilter) {
        let clock = Arc::new(ManualClock::new(0));
        let filter = GeneratorUpdateFilter::new(clock.clone(), GeneratorFilterSettings::default());
        (clock, filter)
    }

    #[test]
    fn test_in_flight_blocks_updates() {
        let (_clock, mut f) = setup();
        assert!(f.should_update(&START));
        f.begin_update(START);
        assert!(f.is_updating());
        assert!(!f.should_update(&START));
        f.finish_update(true);
        assert!(!f.is_updating());
    }

    #[test]
    fn test_failed_update_keeps_reference() {
        let (_clock, mut f) = setup();
        f.did_update(START, false);
        assert!(f.should_update(&START));

        f.did_update(START, true);
        assert!(!f.should_update(&START));
    }

    #[test]
    fn test_vehicle_multiplier() {
        let (clock, mut f) = setup();
        f.did_update(START, true);
        clock.advance(6_000);

        let moved = START.offset(90.0, 100.0);
        assert!(f.should_update(&moved));

        f.set_in_vehicle(true);
        assert!(!f.should_update(&moved));
        assert!(f.should_update(&START.offset(90.0, 250.0)));
    }

    #[test]
    fn test_reset() {
        let (_clock, mut f) = setup();
        f.did_update(START, true);
        f.begin_update(START);
        f.reset();
        assert!(!f.is_updating());
        assert!(f.should_update(&START));
        // Stray finish after reset is ignored
        f.finish_update(true);
        assert!(f.should_update(&START));
    }
}
