//! Field extraction for the supported sentence types
//!
//! Field indices are counted after the address field. A field that is missing
//! because the sentence was truncated reads as empty, so short sentences decode to
//! partial readings.

use chrono::{NaiveDate, NaiveTime};

use super::coordinate::{parse_latitude, parse_longitude};
use super::{
    CourseSpeedReading, DepthReading, DepthSentence, HeadingReading, HeadingReference,
    PositionReading, PositionSentence, WindReading, WindReference,
};
use crate::error::DecodeError;
use crate::geo::{KMH_TO_KN, MS_TO_KN};

const FEET_TO_M: f64 = 0.3048;
const FATHOMS_TO_M: f64 = 1.8288;

/// Comma separated data fields of one sentence
pub(super) struct Fields<'a> {
    values: &'a [&'a str],
}

impl<'a> Fields<'a> {
    pub(super) fn new(values: &'a [&'a str]) -> Self {
        Fields { values }
    }

    fn get(&self, index: usize) -> &'a str {
        self.values.get(index).copied().unwrap_or_default().trim()
    }

    fn f64(&self, index: usize, name: &str) -> Result<Option<f64>, DecodeError> {
        let value = self.get(index);
        if value.is_empty() {
            return Ok(None);
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(DecodeError::invalid_field(name, value)),
        }
    }

    fn u8(&self, index: usize, name: &str) -> Result<Option<u8>, DecodeError> {
        let value = self.get(index);
        if value.is_empty() {
            return Ok(None);
        }
        value
            .parse::<u8>()
            .map(Some)
            .map_err(|_| DecodeError::invalid_field(name, value))
    }

    /// `A` valid, `V` void, anything else unknown
    fn status(&self, index: usize) -> Option<bool> {
        match self.get(index) {
            "A" => Some(true),
            "V" => Some(false),
            _ => None,
        }
    }

    /// Value with an E/W direction letter in the following field, east positive
    fn east_west(&self, index: usize, name: &str) -> Result<Option<f64>, DecodeError> {
        let Some(value) = self.f64(index, name)? else {
            return Ok(None);
        };
        Ok(match self.get(index + 1) {
            "E" => Some(value),
            "W" => Some(-value),
            _ => None,
        })
    }

    /// `hhmmss` or `hhmmss.sss`
    fn time(&self, index: usize) -> Result<Option<NaiveTime>, DecodeError> {
        let value = self.get(index);
        if value.is_empty() {
            return Ok(None);
        }
        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
        if whole.len() != 6
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(DecodeError::invalid_field("time", value));
        }
        let number = |range: std::ops::Range<usize>| whole[range].parse::<u32>().unwrap_or(0);
        let millis = if fraction.is_empty() {
            0
        } else {
            let digits: String = fraction.chars().chain("000".chars()).take(3).collect();
            digits.parse::<u32>().unwrap_or(0)
        };
        Ok(NaiveTime::from_hms_milli_opt(
            number(0..2),
            number(2..4),
            number(4..6),
            millis,
        ))
    }

    /// `ddmmyy`; two-digit years before 70 are in the 2000s
    fn date(&self, index: usize) -> Result<Option<NaiveDate>, DecodeError> {
        let value = self.get(index);
        if value.is_empty() {
            return Ok(None);
        }
        if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DecodeError::invalid_field("date", value));
        }
        let number = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(0);
        let yy = number(4..6) as i32;
        let year = if yy < 70 { 2000 + yy } else { 1900 + yy };
        Ok(NaiveDate::from_ymd_opt(year, number(2..4), number(0..2)))
    }
}

// =============================================================================
// Position sentences
// =============================================================================

/// `GGA,time,lat,N,lon,E,quality,satellites,hdop,alt,M,geoid,M,age,station`
pub(super) fn gga(f: &Fields) -> Result<PositionReading, DecodeError> {
    let mut p = PositionReading::empty(PositionSentence::Gga);
    p.time = f.time(0)?;
    p.latitude = parse_latitude(f.get(1), f.get(2))?;
    p.longitude = parse_longitude(f.get(3), f.get(4))?;
    p.fix_quality = f.u8(5, "fix quality")?;
    p.satellites = f.u8(6, "satellites")?;
    p.hdop = f.f64(7, "hdop")?;
    p.altitude_m = f.f64(8, "altitude")?;
    Ok(p)
}

/// `RMC,time,status,lat,N,lon,E,sog,cog,date,variation,E,mode`
pub(super) fn rmc(f: &Fields) -> Result<PositionReading, DecodeError> {
    let mut p = PositionReading::empty(PositionSentence::Rmc);
    p.time = f.time(0)?;
    p.valid = f.status(1);
    p.latitude = parse_latitude(f.get(2), f.get(3))?;
    p.longitude = parse_longitude(f.get(4), f.get(5))?;
    p.speed_over_ground = f.f64(6, "speed over ground")?;
    p.course_over_ground = f.f64(7, "course over ground")?;
    p.date = f.date(8)?;
    p.magnetic_variation = f.east_west(9, "magnetic variation")?;
    Ok(p)
}

/// `GLL,lat,N,lon,E,time,status,mode`
pub(super) fn gll(f: &Fields) -> Result<PositionReading, DecodeError> {
    let mut p = PositionReading::empty(PositionSentence::Gll);
    p.latitude = parse_latitude(f.get(0), f.get(1))?;
    p.longitude = parse_longitude(f.get(2), f.get(3))?;
    p.time = f.time(4)?;
    p.valid = f.status(5);
    Ok(p)
}

// =============================================================================
// Other instruments
// =============================================================================

/// `VTG,cog,T,cog,M,sog,N,sog,K,mode`
///
/// Falls back to the km/h field when no speed in knots is given.
pub(super) fn vtg(f: &Fields) -> Result<CourseSpeedReading, DecodeError> {
    let knots = f.f64(4, "speed knots")?;
    let kmh = f.f64(6, "speed km/h")?;
    Ok(CourseSpeedReading {
        course_true: f.f64(0, "course true")?,
        course_magnetic: f.f64(2, "course magnetic")?,
        speed_knots: knots.or(kmh.map(|v| v * KMH_TO_KN)),
    })
}

/// `MWV,angle,R|T,speed,N|M|K,status`
pub(super) fn mwv(f: &Fields) -> Result<WindReading, DecodeError> {
    let speed = f.f64(2, "wind speed")?;
    let speed_knots = match f.get(3) {
        "N" | "" => speed,
        "M" => speed.map(|v| v * MS_TO_KN),
        "K" => speed.map(|v| v * KMH_TO_KN),
        _ => None,
    };
    let reference = match f.get(1) {
        "R" => Some(WindReference::Relative),
        "T" => Some(WindReference::True),
        _ => None,
    };
    Ok(WindReading {
        angle: f.f64(0, "wind angle")?,
        reference,
        speed_knots,
        valid: f.status(4),
    })
}

/// `DPT,depth,offset,range`
pub(super) fn dpt(f: &Fields) -> Result<DepthReading, DecodeError> {
    Ok(DepthReading {
        sentence: DepthSentence::Dpt,
        depth_m: f.f64(0, "depth")?,
        offset_m: f.f64(1, "transducer offset")?,
    })
}

/// `DBT,feet,f,meters,M,fathoms,F`
pub(super) fn dbt(f: &Fields) -> Result<DepthReading, DecodeError> {
    let meters = f.f64(2, "depth meters")?;
    let feet = f.f64(0, "depth feet")?;
    let fathoms = f.f64(4, "depth fathoms")?;
    Ok(DepthReading {
        sentence: DepthSentence::Dbt,
        depth_m: meters
            .or(feet.map(|v| v * FEET_TO_M))
            .or(fathoms.map(|v| v * FATHOMS_TO_M)),
        offset_m: None,
    })
}

/// `HDG,heading,deviation,E|W,variation,E|W`
pub(super) fn hdg(f: &Fields) -> Result<HeadingReading, DecodeError> {
    Ok(HeadingReading {
        heading: f.f64(0, "heading")?,
        reference: HeadingReference::Magnetic,
        deviation: f.east_west(1, "deviation")?,
        variation: f.east_west(3, "variation")?,
    })
}

/// `HDT,heading,T`
pub(super) fn hdt(f: &Fields) -> Result<HeadingReading, DecodeError> {
    Ok(HeadingReading {
        heading: f.f64(0, "heading")?,
        reference: HeadingReference::True,
        deviation: None,
        variation: None,
    })
}
