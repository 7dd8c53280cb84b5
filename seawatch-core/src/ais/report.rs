//! AIS targets and the partial reports that update them
//!
//! AIS splits vessel data over two kinds of message: frequent position reports
//! (kinematics) and infrequent static and voyage reports (identity, dimensions).
//! Each message only carries part of the picture, so a report is merged into the
//! target field by field.

use serde::{Deserialize, Serialize};

/// True heading value meaning "not available"
pub const HEADING_NOT_AVAILABLE: f64 = 511.0;

/// Position of the AIS reference point on the hull, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub to_bow: f64,
    pub to_stern: f64,
    pub to_port: f64,
    pub to_starboard: f64,
}

impl Dimensions {
    pub fn length(&self) -> f64 {
        self.to_bow + self.to_stern
    }

    pub fn beam(&self) -> f64 {
        self.to_port + self.to_starboard
    }
}

/// A vessel seen on AIS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AisTarget {
    pub mmsi: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Knots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_over_ground: Option<f64>,
    /// Degrees true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// ITU navigational status code (0 under way using engine, 1 at anchor, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nav_status: Option<u8>,
    /// Degrees per minute, positive to starboard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_of_turn: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imo: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draught: Option<f64>,
    /// Milliseconds since Unix epoch
    pub last_update: u64,
}

impl AisTarget {
    /// A target with nothing known but its identity
    pub fn new(mmsi: u32, last_update: u64) -> Self {
        AisTarget {
            mmsi,
            latitude: None,
            longitude: None,
            speed_over_ground: None,
            course_over_ground: None,
            heading: None,
            nav_status: None,
            rate_of_turn: None,
            name: None,
            call_sign: None,
            imo: None,
            ship_type: None,
            dimensions: None,
            destination: None,
            draught: None,
            last_update,
        }
    }

    /// Latitude and longitude, when both are known
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    /// Check whether the target was updated within `stale_after_ms` of `now`
    pub fn is_fresh(&self, now: u64, stale_after_ms: u64) -> bool {
        now.saturating_sub(self.last_update) <= stale_after_ms
    }
}

/// Position and kinematics from an AIS position report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionReport {
    pub mmsi: u32,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_over_ground: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_over_ground: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nav_status: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_of_turn: Option<f64>,
}

/// Identity, dimensions and voyage data from an AIS static report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticReport {
    pub mmsi: u32,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imo: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draught: Option<f64>,
}

/// A partial update for one target.
///
/// On the wire this is a JSON object tagged with `"kind": "position"` or
/// `"kind": "static"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PartialReport {
    Position(PositionReport),
    Static(StaticReport),
}

impl PartialReport {
    pub fn mmsi(&self) -> u32 {
        match self {
            PartialReport::Position(r) => r.mmsi,
            PartialReport::Static(r) => r.mmsi,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            PartialReport::Position(r) => r.timestamp,
            PartialReport::Static(r) => r.timestamp,
        }
    }

    /// Reported position, for position reports carrying both coordinates
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            PartialReport::Position(r) => Some((r.latitude?, r.longitude?)),
            PartialReport::Static(_) => None,
        }
    }

    /// Overlay the fields this report carries onto `target`.
    ///
    /// Absent fields leave the target untouched, so applying the same report
    /// twice gives the same target as applying it once. The last update time only
    /// moves forward.
    pub fn merge_into(&self, target: &mut AisTarget) {
        match self {
            PartialReport::Position(r) => {
                overlay(&mut target.latitude, r.latitude);
                overlay(&mut target.longitude, r.longitude);
                overlay(&mut target.speed_over_ground, r.speed_over_ground);
                overlay(&mut target.course_over_ground, r.course_over_ground);
                overlay(
                    &mut target.heading,
                    r.heading.filter(|h| *h != HEADING_NOT_AVAILABLE),
                );
                overlay(&mut target.nav_status, r.nav_status);
                overlay(&mut target.rate_of_turn, r.rate_of_turn);
            }
            PartialReport::Static(r) => {
                overlay(&mut target.name, non_empty(&r.name));
                overlay(&mut target.call_sign, non_empty(&r.call_sign));
                overlay(&mut target.imo, r.imo);
                overlay(&mut target.ship_type, r.ship_type);
                overlay(&mut target.dimensions, r.dimensions);
                overlay(&mut target.destination, non_empty(&r.destination));
                overlay(&mut target.draught, r.draught);
            }
        }
        target.last_update = target.last_update.max(self.timestamp());
    }

    /// Create a new target from this report
    pub fn to_target(&self) -> AisTarget {
        let mut target = AisTarget::new(self.mmsi(), self.timestamp());
        self.merge_into(&mut target);
        target
    }
}

fn overlay<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

/// Text fields arrive padded with `@` and spaces
fn non_empty(value: &Option<String>) -> Option<String> {
    let trimmed = value.as_deref()?.trim_end_matches(['@', ' ']).trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
