//! Position Arbiter
//!
//! Owns the current own ship fix and its track history. Fixes arrive from two
//! sources: the instrument feed (primary) and the device location sensor
//! (fallback). Every candidate passes the same plausibility filter, whatever its
//! source.
//!
//! # Source priority
//!
//! While the instrument feed is connected, sensor fixes are ignored. As soon as
//! it disconnects, sensor fixes are accepted, and they are ignored again when it
//! reconnects. There is no hysteresis.
//!
//! # Example
//!
//! ```
//! use seawatch_core::config::ArbiterConfig;
//! use seawatch_core::position::{FixSource, NavigationFix, PositionArbiter, Verdict};
//!
//! let mut arbiter = PositionArbiter::new(ArbiterConfig::default());
//! arbiter.set_instrument_connected(true);
//!
//! let fix = NavigationFix::new(48.1173, 11.5167, 1_000);
//! assert_eq!(arbiter.evaluate(&fix, FixSource::DeviceSensor), Verdict::SourceInactive);
//! assert!(arbiter.accept(fix, FixSource::Instrument));
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ArbiterConfig;
use crate::geo::distance_meters;

mod track;

pub use track::{TrackHistory, TrackPoint};

/// A position fix for own ship
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationFix {
    /// Decimal degrees, north positive
    pub latitude: f64,
    /// Decimal degrees, east positive
    pub longitude: f64,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
    /// Knots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_over_ground: Option<f64>,
    /// Degrees true
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_over_ground: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_quality: Option<u8>,
    /// Estimated horizontal accuracy in meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
}

impl NavigationFix {
    /// A bare position without kinematics or quality information
    pub fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        NavigationFix {
            latitude,
            longitude,
            timestamp,
            speed_over_ground: None,
            course_over_ground: None,
            fix_quality: None,
            horizontal_accuracy: None,
        }
    }

    pub fn with_motion(mut self, speed_over_ground: f64, course_over_ground: f64) -> Self {
        self.speed_over_ground = Some(speed_over_ground);
        self.course_over_ground = Some(course_over_ground);
        self
    }

    pub fn with_accuracy(mut self, horizontal_accuracy: f64) -> Self {
        self.horizontal_accuracy = Some(horizontal_accuracy);
        self
    }

    /// Check that the coordinates are finite and on the globe
    pub fn is_valid_position(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

/// Where a candidate fix came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FixSource {
    /// The wired instrument feed (primary)
    Instrument,
    /// The device's own location sensor (fallback)
    DeviceSensor,
}

/// Outcome of evaluating a candidate fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Accepted,
    /// Sensor fix while the instrument feed is connected
    SourceInactive,
    /// Coordinates not finite or off the globe
    InvalidPosition,
    /// Reported horizontal accuracy worse than the limit (meters)
    InaccurateFix { accuracy_m: f64 },
    /// Implied speed from the current fix above the limit (m/s)
    ImplausibleSpeed { speed_mps: f64 },
    /// Older than the current fix
    OutOfOrder,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }
}

pub struct PositionArbiter {
    config: ArbiterConfig,
    current: Option<NavigationFix>,
    current_source: Option<FixSource>,
    track: TrackHistory,
    instrument_connected: bool,
}

impl PositionArbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        PositionArbiter {
            config,
            current: None,
            current_source: None,
            track: TrackHistory::new(config.track_capacity, config.min_track_separation_m),
            instrument_connected: false,
        }
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Record a connect or disconnect of the instrument feed.
    ///
    /// Takes effect for the next candidate.
    pub fn set_instrument_connected(&mut self, connected: bool) {
        self.instrument_connected = connected;
    }

    pub fn instrument_connected(&self) -> bool {
        self.instrument_connected
    }

    /// The last accepted fix
    pub fn current_fix(&self) -> Option<&NavigationFix> {
        self.current.as_ref()
    }

    /// Source of the last accepted fix
    pub fn current_source(&self) -> Option<FixSource> {
        self.current_source
    }

    pub fn track_history(&self) -> &TrackHistory {
        &self.track
    }

    /// Decide what would happen to `candidate`, without changing any state
    pub fn evaluate(&self, candidate: &NavigationFix, source: FixSource) -> Verdict {
        if source == FixSource::DeviceSensor && self.instrument_connected {
            return Verdict::SourceInactive;
        }
        if !candidate.is_valid_position() {
            return Verdict::InvalidPosition;
        }
        if let Some(accuracy_m) = candidate.horizontal_accuracy {
            if accuracy_m.is_nan() || accuracy_m > self.config.max_accuracy_m {
                return Verdict::InaccurateFix { accuracy_m };
            }
        }

        let Some(previous) = &self.current else {
            return Verdict::Accepted;
        };
        if candidate.timestamp < previous.timestamp {
            return Verdict::OutOfOrder;
        }

        let distance = distance_meters(
            previous.latitude,
            previous.longitude,
            candidate.latitude,
            candidate.longitude,
        );
        let elapsed_s = (candidate.timestamp - previous.timestamp) as f64 / 1000.0;
        let speed_mps = if elapsed_s > 0.0 {
            distance / elapsed_s
        } else if distance > 0.0 {
            // Moved without time passing
            f64::INFINITY
        } else {
            0.0
        };
        if speed_mps > self.config.max_speed_mps {
            return Verdict::ImplausibleSpeed { speed_mps };
        }
        Verdict::Accepted
    }

    /// Evaluate `candidate` and make it the current fix if it passes.
    ///
    /// An accepted fix is also offered to the track history.
    pub fn submit(&mut self, candidate: NavigationFix, source: FixSource) -> Verdict {
        let verdict = self.evaluate(&candidate, source);
        if verdict.is_accepted() {
            self.track.admit(&candidate);
            self.current = Some(candidate);
            self.current_source = Some(source);
        }
        verdict
    }

    /// Submit `candidate`, returning true when it became the current fix.
    ///
    /// Rejections are silent: the current fix and the track are unchanged.
    pub fn accept(&mut self, candidate: NavigationFix, source: FixSource) -> bool {
        self.submit(candidate, source).is_accepted()
    }
}
