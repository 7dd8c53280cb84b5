//! NMEA 0183 Sentence Decoder
//!
//! Pure, stateless translation of a single instrument line into a typed
//! navigation reading. No I/O operations and no state carried between calls, so a
//! malformed sentence can never affect the decoding of the next one.
//!
//! # Supported Sentences
//!
//! | Type | Reading | Content |
//! |------|---------|---------|
//! | GGA | [`Reading::Position`] | time, position, fix quality, satellites, HDOP, altitude |
//! | RMC | [`Reading::Position`] | time, validity, position, SOG, COG, date, variation |
//! | GLL | [`Reading::Position`] | position, time, validity |
//! | VTG | [`Reading::CourseSpeed`] | COG true/magnetic, SOG |
//! | MWV | [`Reading::Wind`] | wind angle, reference, speed, validity |
//! | DPT | [`Reading::Depth`] | depth below transducer, transducer offset |
//! | DBT | [`Reading::Depth`] | depth below transducer |
//! | HDG | [`Reading::Heading`] | magnetic heading, deviation, variation |
//! | HDT | [`Reading::Heading`] | true heading |
//!
//! Any other type code, and every proprietary (`$P...`) sentence, decodes to
//! `Ok(None)` so that new instruments on the bus do not produce errors.
//!
//! # Example
//!
//! ```
//! use seawatch_core::nmea::{decode, Reading, WindReference};
//!
//! match decode("$IIMWV,045.0,R,12.5,N,A*0A") {
//!     Ok(Some(Reading::Wind(wind))) => {
//!         assert_eq!(wind.reference, Some(WindReference::Relative));
//!         assert_eq!(wind.speed_knots, Some(12.5));
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::position::NavigationFix;

pub mod checksum;
pub mod coordinate;
mod sentence;

pub use checksum::{compute_checksum, format_sentence};
pub use coordinate::{format_latitude, format_longitude, parse_latitude, parse_longitude};

/// Nominal user equivalent range error used to turn HDOP into meters
pub const NOMINAL_UERE_M: f64 = 5.0;

// =============================================================================
// Readings
// =============================================================================

/// A decoded navigation reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reading {
    Position(PositionReading),
    CourseSpeed(CourseSpeedReading),
    Wind(WindReading),
    Depth(DepthReading),
    Heading(HeadingReading),
}

/// Sentence a position reading was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSentence {
    Gga,
    Rmc,
    Gll,
}

/// Position fix as transmitted by a GNSS receiver
///
/// Every field is optional: a receiver without a fix still sends sentences, just
/// with empty fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReading {
    pub sentence: PositionSentence,
    /// UTC time of the fix
    pub time: Option<NaiveTime>,
    /// UTC date (RMC only)
    pub date: Option<NaiveDate>,
    /// Decimal degrees, north positive
    pub latitude: Option<f64>,
    /// Decimal degrees, east positive
    pub longitude: Option<f64>,
    /// Status field (RMC/GLL): `A` valid, `V` void
    pub valid: Option<bool>,
    /// GGA fix quality: 0 invalid, 1 GPS, 2 DGPS, 4 RTK fixed, 5 RTK float, ...
    pub fix_quality: Option<u8>,
    pub satellites: Option<u8>,
    /// Horizontal dilution of precision
    pub hdop: Option<f64>,
    /// Antenna altitude above mean sea level in meters
    pub altitude_m: Option<f64>,
    /// Knots
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    pub course_over_ground: Option<f64>,
    /// Degrees, east positive
    pub magnetic_variation: Option<f64>,
}

impl PositionReading {
    pub(crate) fn empty(sentence: PositionSentence) -> Self {
        PositionReading {
            sentence,
            time: None,
            date: None,
            latitude: None,
            longitude: None,
            valid: None,
            fix_quality: None,
            satellites: None,
            hdop: None,
            altitude_m: None,
            speed_over_ground: None,
            course_over_ground: None,
            magnetic_variation: None,
        }
    }

    /// Check whether the receiver flagged this reading as a usable fix
    pub fn has_fix(&self) -> bool {
        self.valid != Some(false) && self.fix_quality != Some(0)
    }

    /// Estimated horizontal accuracy in meters, derived from HDOP
    pub fn horizontal_accuracy(&self) -> Option<f64> {
        self.hdop.map(|hdop| hdop * NOMINAL_UERE_M)
    }

    /// Convert into a [`NavigationFix`] stamped with the time it was received.
    ///
    /// Returns `None` when the position is incomplete or the receiver reports no
    /// fix (RMC/GLL status `V`, GGA quality 0).
    pub fn to_fix(&self, received_ms: u64) -> Option<NavigationFix> {
        if !self.has_fix() {
            return None;
        }
        let (latitude, longitude) = (self.latitude?, self.longitude?);
        Some(NavigationFix {
            latitude,
            longitude,
            timestamp: received_ms,
            speed_over_ground: self.speed_over_ground,
            course_over_ground: self.course_over_ground,
            fix_quality: self.fix_quality,
            horizontal_accuracy: self.horizontal_accuracy(),
        })
    }
}

/// Course and speed over ground (VTG)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSpeedReading {
    /// Degrees true
    pub course_true: Option<f64>,
    /// Degrees magnetic
    pub course_magnetic: Option<f64>,
    /// Knots
    pub speed_knots: Option<f64>,
}

/// Wind angle reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindReference {
    /// Apparent wind, relative to the bow
    Relative,
    /// True wind
    True,
}

/// Wind angle and speed (MWV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindReading {
    /// Degrees, 0-359
    pub angle: Option<f64>,
    pub reference: Option<WindReference>,
    /// Wind speed converted to knots
    pub speed_knots: Option<f64>,
    /// Status field: `A` valid, `V` invalid
    pub valid: Option<bool>,
}

/// Sentence a depth reading was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DepthSentence {
    Dpt,
    Dbt,
}

/// Water depth (DPT, DBT)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthReading {
    pub sentence: DepthSentence,
    /// Depth below the transducer in meters
    pub depth_m: Option<f64>,
    /// Transducer offset in meters: positive to the waterline, negative to the keel
    pub offset_m: Option<f64>,
}

impl DepthReading {
    /// Depth with the transducer offset applied (below waterline or below keel,
    /// depending on the sign of the offset)
    pub fn adjusted_depth(&self) -> Option<f64> {
        self.depth_m.map(|depth| depth + self.offset_m.unwrap_or(0.0))
    }
}

/// Reference of a heading reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingReference {
    /// Magnetic sensor heading (HDG)
    Magnetic,
    /// True heading (HDT)
    True,
}

/// Vessel heading (HDG, HDT)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingReading {
    /// Degrees
    pub heading: Option<f64>,
    pub reference: HeadingReference,
    /// Magnetic deviation in degrees, east positive
    pub deviation: Option<f64>,
    /// Magnetic variation in degrees, east positive
    pub variation: Option<f64>,
}

impl HeadingReading {
    /// Heading in degrees true, applying deviation and variation to a magnetic
    /// sensor heading. `None` for a magnetic heading without known variation.
    pub fn true_heading(&self) -> Option<f64> {
        let heading = self.heading?;
        let corrected = match self.reference {
            HeadingReference::True => heading,
            HeadingReference::Magnetic => {
                heading + self.deviation.unwrap_or(0.0) + self.variation?
            }
        };
        Some(corrected.rem_euclid(360.0))
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one line from an instrument stream.
///
/// Surrounding whitespace and the CR/LF terminator are ignored.
///
/// # Returns
/// - `Ok(Some(reading))` for a supported sentence, possibly with absent fields
/// - `Ok(None)` for a valid sentence of an unsupported or proprietary type
/// - `Err(DecodeError)` for a structural or checksum failure
pub fn decode(line: &str) -> Result<Option<Reading>, DecodeError> {
    let line = line.trim();
    let body = checksum::validated_body(line)?;

    let mut parts = body.split(',');
    let address = parts.next().unwrap_or_default();
    let fields: Vec<&str> = parts.collect();

    if !address.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(DecodeError::InvalidFormat(format!(
            "address field '{}' is not alphanumeric",
            address
        )));
    }
    if address.starts_with('P') {
        // Proprietary sentence, manufacturer specific
        return Ok(None);
    }
    if address.len() < 5 {
        return Err(DecodeError::InvalidFormat(format!(
            "address field '{}' is too short",
            address
        )));
    }
    if address.len() > 5 {
        return Ok(None);
    }

    let fields = sentence::Fields::new(&fields);
    let reading = match &address[2..] {
        "GGA" => Reading::Position(sentence::gga(&fields)?),
        "RMC" => Reading::Position(sentence::rmc(&fields)?),
        "GLL" => Reading::Position(sentence::gll(&fields)?),
        "VTG" => Reading::CourseSpeed(sentence::vtg(&fields)?),
        "MWV" => Reading::Wind(sentence::mwv(&fields)?),
        "DPT" => Reading::Depth(sentence::dpt(&fields)?),
        "DBT" => Reading::Depth(sentence::dbt(&fields)?),
        "HDG" => Reading::Heading(sentence::hdg(&fields)?),
        "HDT" => Reading::Heading(sentence::hdt(&fields)?),
        _ => return Ok(None),
    };
    Ok(Some(reading))
}
