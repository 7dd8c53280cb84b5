//! Geodesy helpers
//!
//! Unit constants and the small amount of spherical geometry shared by the
//! position arbiter and the collision predictor.

/// Mean earth radius in meters (IUGG)
pub const EARTH_RADIUS: f64 = 6_371_008.8;

/// One international nautical mile in meters
pub const NAUTICAL_MILE: f64 = 1852.0;

/// Knots to meters per second
pub const KN_TO_MS: f64 = NAUTICAL_MILE / 3600.0;

/// Meters per second to knots
pub const MS_TO_KN: f64 = 3600.0 / NAUTICAL_MILE;

/// Kilometers per hour to knots
pub const KMH_TO_KN: f64 = 1000.0 / NAUTICAL_MILE;

/// Great-circle distance in meters between two positions (haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Offset of `(lat, lon)` from the origin `(lat0, lon0)` in nautical miles,
/// as `(east, north)` on a local flat plane.
///
/// Equirectangular approximation around the mean latitude; good to well under a
/// percent over the few tens of miles that matter for collision avoidance.
/// Longitude differences are wrapped so the antimeridian does not blow up the
/// east component.
pub fn local_offset_nm(lat0: f64, lon0: f64, lat: f64, lon: f64) -> (f64, f64) {
    let mut d_lon = lon - lon0;
    if d_lon > 180.0 {
        d_lon -= 360.0;
    } else if d_lon < -180.0 {
        d_lon += 360.0;
    }
    let mean_lat = ((lat0 + lat) / 2.0).to_radians();
    let east = d_lon * 60.0 * mean_lat.cos();
    let north = (lat - lat0) * 60.0;
    (east, north)
}

/// Split a speed (any unit) and a course in degrees true into `(east, north)`
/// components of the same unit.
pub fn velocity_components(speed: f64, course_deg: f64) -> (f64, f64) {
    let course = course_deg.to_radians();
    (speed * course.sin(), speed * course.cos())
}

/// Bearing in degrees true `[0, 360)` of an `(east, north)` offset.
pub fn bearing_degrees(east: f64, north: f64) -> f64 {
    let bearing = east.atan2(north).to_degrees();
    if bearing < 0.0 {
        bearing + 360.0
    } else {
        bearing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_minute_of_latitude_is_a_nautical_mile() {
        let d = distance_meters(50.0, 0.0, 50.0 + 1.0 / 60.0, 0.0);
        assert!((d - NAUTICAL_MILE).abs() < 5.0, "got {}", d);
    }

    #[test]
    fn test_distance_is_symmetric_and_zero_on_identity() {
        let a = distance_meters(48.1173, 11.5167, 48.2, 11.6);
        let b = distance_meters(48.2, 11.6, 48.1173, 11.5167);
        assert!((a - b).abs() < 1e-6);
        assert_eq!(distance_meters(10.0, 20.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_local_offset() {
        let (east, north) = local_offset_nm(0.0, 0.0, 1.0, 0.0);
        assert!(east.abs() < 1e-9);
        assert!((north - 60.0).abs() < 1e-9);

        let (east, _) = local_offset_nm(0.0, 0.0, 0.0, 1.0);
        assert!((east - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_offset_across_antimeridian() {
        let (east, _) = local_offset_nm(0.0, 179.9, 0.0, -179.9);
        assert!((east - 12.0).abs() < 1e-6, "got {}", east);
    }

    #[test]
    fn test_velocity_components() {
        let (e, n) = velocity_components(10.0, 90.0);
        assert!((e - 10.0).abs() < 1e-9);
        assert!(n.abs() < 1e-9);

        let (e, n) = velocity_components(10.0, 180.0);
        assert!(e.abs() < 1e-9);
        assert!((n + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_degrees() {
        assert!((bearing_degrees(0.0, 1.0) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(1.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, -1.0) - 180.0).abs() < 1e-9);
        assert!((bearing_degrees(-1.0, 0.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((10.0 * KN_TO_MS * MS_TO_KN - 10.0).abs() < 1e-12);
        assert!((1.852 * KMH_TO_KN - 1.0).abs() < 1e-12);
    }
}
