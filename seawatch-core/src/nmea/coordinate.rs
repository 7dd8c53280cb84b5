//! Degrees-minutes coordinate fields
//!
//! NMEA transmits latitude as `DDMM.MMMM` and longitude as `DDDMM.MMMM`, each
//! followed by a hemisphere letter in its own field.

use std::fmt::Write;

use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn name(self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }

    fn limit(self) -> f64 {
        match self {
            Axis::Latitude => 90.0,
            Axis::Longitude => 180.0,
        }
    }

    fn sign(self, hemisphere: &str) -> Option<f64> {
        match (self, hemisphere) {
            (Axis::Latitude, "N") | (Axis::Longitude, "E") => Some(1.0),
            (Axis::Latitude, "S") | (Axis::Longitude, "W") => Some(-1.0),
            _ => None,
        }
    }
}

/// Parse a latitude field pair (`DDMM.MMMM`, `N|S`) into signed decimal degrees.
///
/// Returns `Ok(None)` when the value is empty, the hemisphere letter is not N/S, or
/// the value is out of range; such a coordinate is treated as absent rather than
/// guessed at. A value that is not a number is a format error.
pub fn parse_latitude(value: &str, hemisphere: &str) -> Result<Option<f64>, DecodeError> {
    parse_coordinate(Axis::Latitude, value, hemisphere)
}

/// Parse a longitude field pair (`DDDMM.MMMM`, `E|W`) into signed decimal degrees.
///
/// Same absence rules as [`parse_latitude`].
pub fn parse_longitude(value: &str, hemisphere: &str) -> Result<Option<f64>, DecodeError> {
    parse_coordinate(Axis::Longitude, value, hemisphere)
}

fn parse_coordinate(axis: Axis, value: &str, hemisphere: &str) -> Result<Option<f64>, DecodeError> {
    if value.is_empty() {
        return Ok(None);
    }
    if !value.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(DecodeError::invalid_field(axis.name(), value));
    }
    let raw: f64 = value
        .parse()
        .map_err(|_| DecodeError::invalid_field(axis.name(), value))?;

    let Some(sign) = axis.sign(hemisphere) else {
        return Ok(None);
    };

    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if minutes >= 60.0 {
        return Ok(None);
    }
    let decimal = degrees + minutes / 60.0;
    if decimal > axis.limit() {
        return Ok(None);
    }
    Ok(Some(sign * decimal))
}

/// Encode decimal degrees as a latitude field pair, e.g. `4807.0380,N`
pub fn format_latitude(degrees: f64) -> String {
    let hemisphere = if degrees < 0.0 { 'S' } else { 'N' };
    format_coordinate(degrees.abs(), 2, hemisphere)
}

/// Encode decimal degrees as a longitude field pair, e.g. `01131.0000,E`
pub fn format_longitude(degrees: f64) -> String {
    let hemisphere = if degrees < 0.0 { 'W' } else { 'E' };
    format_coordinate(degrees.abs(), 3, hemisphere)
}

fn format_coordinate(magnitude: f64, degree_digits: usize, hemisphere: char) -> String {
    let mut whole = magnitude.trunc();
    let mut minutes = ((magnitude - whole) * 60.0 * 10_000.0).round() / 10_000.0;
    if minutes >= 60.0 {
        whole += 1.0;
        minutes -= 60.0;
    }
    let mut out = String::with_capacity(degree_digits + 10);
    let _ = write!(
        &mut out,
        "{:0width$}{:07.4},{}",
        whole as u32,
        minutes,
        hemisphere,
        width = degree_digits
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("coordinate should be present");
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_parse_latitude() {
        assert_close(parse_latitude("4807.038", "N").unwrap(), 48.1173);
        assert_close(parse_latitude("4807.038", "S").unwrap(), -48.1173);
        assert_close(parse_latitude("0000.000", "N").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_longitude() {
        assert_close(parse_longitude("01131.000", "E").unwrap(), 11.5167);
        assert_close(parse_longitude("01131.000", "W").unwrap(), -11.5167);
        assert_close(parse_longitude("17959.999", "W").unwrap(), -179.99998);
    }

    #[test]
    fn test_empty_value_is_absent_not_zero() {
        assert_eq!(parse_latitude("", "N").unwrap(), None);
        assert_eq!(parse_longitude("", "").unwrap(), None);
    }

    #[test]
    fn test_unknown_hemisphere_is_absent() {
        assert_eq!(parse_latitude("4807.038", "E").unwrap(), None);
        assert_eq!(parse_latitude("4807.038", "").unwrap(), None);
        assert_eq!(parse_longitude("01131.000", "N").unwrap(), None);
        assert_eq!(parse_longitude("01131.000", "x").unwrap(), None);
    }

    #[test]
    fn test_out_of_range_is_absent() {
        assert_eq!(parse_latitude("9100.000", "N").unwrap(), None);
        assert_eq!(parse_latitude("4875.000", "N").unwrap(), None);
        assert_eq!(parse_longitude("18100.000", "E").unwrap(), None);
    }

    #[test]
    fn test_garbage_is_format_error() {
        assert!(matches!(
            parse_latitude("48O7.038", "N"),
            Err(DecodeError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_longitude("-01131.000", "E"),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_format_coordinates() {
        assert_eq!(format_latitude(48.1173), "4807.0380,N");
        assert_eq!(format_longitude(-11.5166666), "01131.0000,W");
        assert_eq!(format_latitude(-0.5), "0030.0000,S");
    }

    #[test]
    fn test_format_carries_rounded_minutes() {
        assert_eq!(format_latitude(10.999_999_9), "1100.0000,N");
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        for &(lat, lon) in &[
            (48.1173, 11.5167),
            (-33.8568, 151.2153),
            (0.0001, -0.0001),
            (89.99, -179.99),
            (52.370216, 4.895168),
        ] {
            let lat_field = format_latitude(lat);
            let lon_field = format_longitude(lon);
            let (lat_value, lat_hemi) = lat_field.split_once(',').unwrap();
            let (lon_value, lon_hemi) = lon_field.split_once(',').unwrap();

            assert_close(parse_latitude(lat_value, lat_hemi).unwrap(), lat);
            assert_close(parse_longitude(lon_value, lon_hemi).unwrap(), lon);
        }
    }
}
