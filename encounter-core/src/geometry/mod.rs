//! Geometry for vessel encounters
//!
//! Pure functions, no state:
//!
//! - **distance / bearing**: great-circle on a spherical earth
//! - **cpa**: closest point of approach via relative-motion vectors
//! - **colregs**: head-on / crossing / overtaking classification
//!
//! Relative motion is computed in a [`LocalFrame`], a flat east/north meter
//! grid around the two vessels. That approximation is good for the short
//! ranges (a few nautical miles) an encounter spans.

mod colregs;
mod cpa;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

pub use colregs::{
    classify_encounter, course_divergence, Classification, ColregsThresholds, EncounterType,
};
pub use cpa::{closest_approach, CpaResult};

/// Conversion constants
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const NAUTICAL_MILE: f64 = 1852.0;
pub const KN_TO_MS: f64 = NAUTICAL_MILE / 3600.0;
pub const METERS_PER_DEGREE_LATITUDE: f64 = 60.0 * NAUTICAL_MILE; // 60 nautical miles

/// A point on the earth in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance in meters (haversine)
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points
    2.0 * EARTH_RADIUS_M * h.min(1.0).sqrt().asin()
}

/// Initial great-circle bearing from `a` to `b` in degrees (0-360, north = 0)
pub fn bearing(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_degrees(y.atan2(x).to_degrees())
}

/// Wrap an angle into [0, 360)
pub fn normalize_degrees(deg: f64) -> f64 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Calculate meters per degree longitude at a given latitude
#[inline]
pub fn meters_per_degree_longitude(lat_deg: f64) -> f64 {
    METERS_PER_DEGREE_LATITUDE * lat_deg.to_radians().cos()
}

/// Velocity vector (east, north) in m/s from speed over ground and course over ground
pub fn velocity(sog_kn: f64, cog_deg: f64) -> Vector2<f64> {
    let speed_ms = sog_kn * KN_TO_MS;
    let course_rad = cog_deg.to_radians();
    Vector2::new(speed_ms * course_rad.sin(), speed_ms * course_rad.cos())
}

/// Flat east/north meter grid anchored at an origin point
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: GeoPoint,
    meters_per_degree_lon: f64,
}

impl LocalFrame {
    /// Frame centered on `origin`, longitude scaled at the origin latitude
    pub fn new(origin: GeoPoint) -> Self {
        Self {
            origin,
            meters_per_degree_lon: meters_per_degree_longitude(origin.lat),
        }
    }

    /// Frame for a pair of points, scaled at their mean latitude
    pub fn for_pair(a: GeoPoint, b: GeoPoint) -> Self {
        let mut frame = Self::new(a);
        frame.meters_per_degree_lon = meters_per_degree_longitude((a.lat + b.lat) / 2.0);
        frame
    }

    /// Position of `p` in meters (east, north) relative to the frame origin
    pub fn project(&self, p: GeoPoint) -> Vector2<f64> {
        let mut dlon = p.lon - self.origin.lon;
        if dlon > 180.0 {
            dlon -= 360.0;
        } else if dlon < -180.0 {
            dlon += 360.0;
        }
        Vector2::new(
            dlon * self.meters_per_degree_lon,
            (p.lat - self.origin.lat) * METERS_PER_DEGREE_LATITUDE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_same_point_is_zero() {
        let p = GeoPoint::new(52.0, 4.0);
        assert_eq!(distance(p, p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (GeoPoint::new(52.0, 4.0), GeoPoint::new(53.5, 6.2)),
            (GeoPoint::new(-23.5505, -46.6333), GeoPoint::new(-22.9068, -43.1729)),
            (GeoPoint::new(51.9225, 4.4792), GeoPoint::new(51.9775, 4.1217)),
            (GeoPoint::new(0.0, 179.9), GeoPoint::new(0.0, -179.9)),
        ];
        for (a, b) in pairs {
            assert!((distance(a, b) - distance(b, a)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_distance_known_values() {
        // One degree of latitude is ~111.2 km on a 6371 km sphere
        let d = distance(GeoPoint::new(52.0, 4.0), GeoPoint::new(53.0, 4.0));
        assert!((d - 111_195.0).abs() < 100.0);

        // One degree of longitude on the equator, same length
        let d = distance(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111_195.0).abs() < 100.0);

        // Rotterdam to Hook of Holland, ~25 km
        let d = distance(GeoPoint::new(51.9225, 4.4792), GeoPoint::new(51.9775, 4.1217));
        assert!((d - 25_000.0).abs() < 2_500.0);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = GeoPoint::new(52.0, 4.0);
        assert!(bearing(origin, GeoPoint::new(52.1, 4.0)).abs() < 0.01);
        assert!((bearing(origin, GeoPoint::new(52.0, 4.1)) - 90.0).abs() < 0.1);
        assert!((bearing(origin, GeoPoint::new(51.9, 4.0)) - 180.0).abs() < 0.01);
        assert!((bearing(origin, GeoPoint::new(52.0, 3.9)) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert!(normalize_degrees(-1e-20) < 360.0);
    }

    #[test]
    fn test_velocity_components() {
        let v = velocity(10.0, 90.0);
        assert!((v.x - 10.0 * KN_TO_MS).abs() < 1e-9);
        assert!(v.y.abs() < 1e-9);

        let v = velocity(10.0, 180.0);
        assert!(v.x.abs() < 1e-9);
        assert!((v.y + 10.0 * KN_TO_MS).abs() < 1e-9);
    }

    #[test]
    fn test_local_frame_projection() {
        let frame = LocalFrame::new(GeoPoint::new(0.0, 0.0));
        let p = frame.project(GeoPoint::new(1.0, 1.0));
        assert!((p.x - METERS_PER_DEGREE_LATITUDE).abs() < 1e-6);
        assert!((p.y - METERS_PER_DEGREE_LATITUDE).abs() < 1e-6);

        // Crossing the antimeridian stays short
        let frame = LocalFrame::new(GeoPoint::new(0.0, 179.99));
        let p = frame.project(GeoPoint::new(0.0, -179.99));
        assert!(p.x > 0.0 && p.x < 3_000.0);
    }
}
