//! Geographic positions and point-of-interest regions.
//!
//! # Coordinate System
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Bearing: degrees clockwise from north (0-360)
//! - Distance: meters

use serde::{Deserialize, Serialize};

use crate::circular::normalize_degrees;

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A position on the earth's surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance in meters (haversine)
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = lat2 - lat1;
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Initial great-circle bearing towards `other`, in `[0, 360)`
    pub fn bearing_to(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

        normalize_degrees(y.atan2(x).to_degrees())
    }

    /// Destination reached by travelling `distance_m` along `bearing_deg`
    pub fn offset(&self, bearing_deg: f64, distance_m: f64) -> GeoPoint {
        let lat1 = self.latitude.to_radians();
        let lon1 = self.longitude.to_radians();
        let bearing = bearing_deg.to_radians();
        let angular = distance_m / EARTH_RADIUS_M;

        let lat2 =
            (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon2 = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat2.sin());

        // Wrap longitude into [-180, 180)
        let lon2 = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;

        GeoPoint::new(lat2.to_degrees(), lon2)
    }
}

/// A point-of-interest footprint, such as a building outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Stable identifier of the point of interest
    pub id: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Polygon vertices, in order (closing vertex optional)
    pub boundary: Vec<GeoPoint>,
}

impl Region {
    pub fn new(id: impl Into<String>, boundary: Vec<GeoPoint>) -> Self {
        Region {
            id: id.into(),
            name: None,
            boundary,
        }
    }

    /// Even-odd containment test in latitude/longitude space.
    ///
    /// Footprints are small enough that treating lat/lon as planar is fine.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        let vertices = &self.boundary;
        if vertices.len() < 3 {
            return false;
        }

        let (x, y) = (point.longitude, point.latitude);
        let mut inside = false;
        let mut j = vertices.len() - 1;

        for i in 0..vertices.len() {
            let (xi, yi) = (vertices[i].longitude, vertices[i].latitude);
            let (xj, yj) = (vertices[j].longitude, vertices[j].latitude);

            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }

        inside
    }
}

/// Finds the point-of-interest region that contains a position
pub trait RegionLookup: Send + Sync {
    fn region_containing(&self, point: &GeoPoint) -> Option<Region>;
}

/// A fixed list of regions, searched in order
#[derive(Debug, Clone, Default)]
pub struct StaticRegions {
    regions: Vec<Region>,
}

impl StaticRegions {
    pub fn new(regions: Vec<Region>) -> Self {
        StaticRegions { regions }
    }
}

impl RegionLookup for StaticRegions {
    fn region_containing(&self, point: &GeoPoint) -> Option<Region> {
        self.regions.iter().find(|r| r.contains(point)).cloned()
    }
}
