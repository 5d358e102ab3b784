//! Utility functions for distances and planar projections on raw lat/lon pairs

use crate::Coordinate;

/// Earth radius in meters used by every distance in this crate
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Distance within which a stop is considered to lie on a segment
pub const STOP_SNAP_RADIUS_M: f64 = 50.0;

/// Maximum absolute latitude accepted for a coordinate
pub const MAX_LATITUDE: f64 = 90.0;

/// Maximum absolute longitude accepted for a coordinate
pub const MAX_LONGITUDE: f64 = 180.0;

/// Calculate the Haversine distance between two coordinates in meters
///
/// # Arguments
/// * `a` - First coordinate in decimal degrees
/// * `b` - Second coordinate in decimal degrees
#[inline]
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Project `p` onto the segment `a`-`b`, clamped to its endpoints
///
/// The projection is planar in raw (lat, lon) space. No latitude scaling is
/// applied, so results stay stable for the same inputs on any platform.
/// A zero-length segment projects to `a`.
#[inline]
pub fn project_on_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> Coordinate {
    let d_lat = b.lat - a.lat;
    let d_lon = b.lon - a.lon;
    let len_sq = d_lat * d_lat + d_lon * d_lon;

    if len_sq == 0.0 {
        return a;
    }

    let t = (((p.lat - a.lat) * d_lat + (p.lon - a.lon) * d_lon) / len_sq).clamp(0.0, 1.0);

    Coordinate::new(a.lat + t * d_lat, a.lon + t * d_lon)
}

/// Linear interpolation between two coordinates, each axis independently
#[inline]
pub fn interpolate(a: Coordinate, b: Coordinate, fraction: f64) -> Coordinate {
    Coordinate::new(
        a.lat + (b.lat - a.lat) * fraction,
        a.lon + (b.lon - a.lon) * fraction,
    )
}

/// Check whether a coordinate is finite and inside WGS84 bounds
#[inline]
pub fn is_valid_coordinate(c: Coordinate) -> bool {
    c.lat.is_finite()
        && c.lon.is_finite()
        && c.lat.abs() <= MAX_LATITUDE
        && c.lon.abs() <= MAX_LONGITUDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let p = Coordinate::new(51.5074, -0.1278);
        assert!(haversine_distance(p, p).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_one_degree_of_longitude_at_equator() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 1.0));
        // 2 * pi * 6371 km / 360
        assert!((d - 111_194.93).abs() < 1.0);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = Coordinate::new(48.2082, 16.3738);
        let b = Coordinate::new(48.1486, 17.1077);
        assert!((haversine_distance(a, b) - haversine_distance(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_projection_inside_segment() {
        let p = project_on_segment(
            Coordinate::new(1.0, 5.0),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 10.0),
        );
        assert_eq!(p, Coordinate::new(0.0, 5.0));
    }

    #[test]
    fn test_projection_is_clamped() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 10.0);
        assert_eq!(project_on_segment(Coordinate::new(0.0, -3.0), a, b), a);
        assert_eq!(project_on_segment(Coordinate::new(2.0, 42.0), a, b), b);
    }

    #[test]
    fn test_projection_on_degenerate_segment() {
        let a = Coordinate::new(3.0, 4.0);
        assert_eq!(project_on_segment(Coordinate::new(9.0, 9.0), a, a), a);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let mid = interpolate(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 10.0), 0.5);
        assert_eq!(mid, Coordinate::new(0.0, 5.0));
    }

    #[test]
    fn test_is_valid_coordinate() {
        assert!(is_valid_coordinate(Coordinate::new(0.0, 0.0)));
        assert!(is_valid_coordinate(Coordinate::new(-90.0, 180.0)));
        assert!(!is_valid_coordinate(Coordinate::new(90.5, 0.0)));
        assert!(!is_valid_coordinate(Coordinate::new(f64::NAN, 0.0)));
    }
}
