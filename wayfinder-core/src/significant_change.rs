//! Significant-change monitoring origin
//!
//! While location tracking runs in low-power mode, this decides when the user
//! has moved far enough to resume full-resolution tracking. Inside a point of
//! interest the whole footprint is the anchor, so GPS jitter near the boundary
//! of a building does not keep waking tracking up.

use crate::config::SignificantChangeSettings;
use crate::geo::{GeoPoint, Region, RegionLookup};

/// What the origin is anchored to
#[derive(Debug, Clone, PartialEq)]
pub enum MonitoringAnchor {
    /// User was inside a point-of-interest footprint
    Region(Region),
    /// User was not inside any known footprint
    Point(GeoPoint),
}

#[derive(Debug, Clone)]
pub struct SignificantChangeMonitoringOrigin {
    anchor: MonitoringAnchor,
    radius_m: f64,
}

impl SignificantChangeMonitoringOrigin {
    /// Anchor at `location`, preferring a containing region when there is one.
    pub fn new(
        location: GeoPoint,
        regions: &dyn RegionLookup,
        settings: &SignificantChangeSettings,
    ) -> Self {
        let anchor = match regions.region_containing(&location) {
            Some(region) => {
                log::debug!("Significant change origin anchored to region {}", region.id);
                MonitoringAnchor::Region(region)
            }
            None => MonitoringAnchor::Point(location),
        };

        SignificantChangeMonitoringOrigin {
            anchor,
            radius_m: settings.radius_m,
        }
    }

    pub fn anchor(&self) -> &MonitoringAnchor {
        &self.anchor
    }

    /// Whether `location` is far enough from the anchor to resume tracking
    pub fn should_update_location(&self, location: &GeoPoint) -> bool {
        match &self.anchor {
            MonitoringAnchor::Region(region) => !region.contains(location),
            MonitoringAnchor::Point(origin) => origin.distance_to(location) > self.radius_m,
        }
    }
}

/// Origins match when anchored to the same region id, or to equal points.
impl PartialEq for SignificantChangeMonitoringOrigin {
    fn eq(&self, other: &Self) -> bool {
        match (&self.anchor, &other.anchor) {
            (MonitoringAnchor::Region(a), MonitoringAnchor::Region(b)) => a.id == b.id,
            (MonitoringAnchor::Point(a), MonitoringAnchor::Point(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::StaticRegions;

    const CENTER: GeoPoint = GeoPoint::new(40.7484, -73.9857);

    fn building() -> Region {
        let d = 0.0005; // roughly 55 m north-south
        Region::new(
            "building",
            vec![
                GeoPoint::new(CENTER.latitude - d, CENTER.longitude - d),
                GeoPoint::new(CENTER.latitude - d, CENTER.longitude + d),
                GeoPoint::new(CENTER.latitude + d, CENTER.longitude + d),
                GeoPoint::new(CENTER.latitude + d, CENTER.longitude - d),
            ],
        )
    }

    #[test]
    fn test_point_anchor_uses_radius() {
        let origin = SignificantChangeMonitoringOrigin::new(
            CENTER,
            &StaticRegions::default(),
            &SignificantChangeSettings::default(),
        );
        assert_eq!(origin.anchor(), &MonitoringAnchor::Point(CENTER));
        assert!(!origin.should_update_location(&CENTER.offset(45.0, 39.0)));
        assert!(origin.should_update_location(&CENTER.offset(45.0, 41.0)));
    }

    #[test]
    fn test_region_anchor_ignores_radius() {
        let regions = StaticRegions::new(vec![building()]);
        let origin = SignificantChangeMonitoringOrigin::new(
            CENTER,
            &regions,
            &SignificantChangeSettings::default(),
        );
        assert!(matches!(origin.anchor(), MonitoringAnchor::Region(r) if r.id == "building"));

        // 50 m north is past the radius but still inside the footprint
        assert!(!origin.should_update_location(&CENTER.offset(0.0, 50.0)));
        assert!(origin.should_update_location(&CENTER.offset(0.0, 70.0)));
    }

    #[test]
    fn test_equality() {
        let regions = StaticRegions::new(vec![building()]);
        let settings = SignificantChangeSettings::default();

        let a = SignificantChangeMonitoringOrigin::new(CENTER, &regions, &settings);
        let nearby = CENTER.offset(0.0, 10.0);
        let b = SignificantChangeMonitoringOrigin::new(nearby, &regions, &settings);
        assert_eq!(a, b);

        let none = StaticRegions::default();
        let p = SignificantChangeMonitoringOrigin::new(CENTER, &none, &settings);
        let q = SignificantChangeMonitoringOrigin::new(CENTER.offset(0.0, 10.0), &none, &settings);
        assert_ne!(a, p);
        assert_ne!(p, q);
        assert_eq!(p, SignificantChangeMonitoringOrigin::new(CENTER, &none, &settings));
    }
}
