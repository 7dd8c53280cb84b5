//! Seawatch Core - Platform-independent navigation picture library
//!
//! This crate contains the pure logic behind the navigation display: decoding of
//! marine instrument sentences, arbitration between position sources, the AIS
//! target registry and collision prediction. It has no I/O dependencies and no
//! async runtime, so every component can be driven directly from tests.
//!
//! # Components
//!
//! - **nmea**: Stateless NMEA 0183 sentence decoder (checksum, dispatch, coordinates)
//! - **position**: Position arbiter fusing the instrument feed with a fallback sensor
//! - **ais**: Capacity- and staleness-bounded registry of AIS targets with batching
//! - **collision**: CPA/TCPA prediction and ranked collision warnings
//!
//! # Example
//!
//! ```rust
//! use seawatch_core::nmea::{decode, Reading};
//! use seawatch_core::position::{FixSource, PositionArbiter};
//! use seawatch_core::config::ArbiterConfig;
//!
//! let line = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
//! let mut arbiter = PositionArbiter::new(ArbiterConfig::default());
//!
//! if let Ok(Some(Reading::Position(reading))) = decode(line) {
//!     if let Some(fix) = reading.to_fix(1_000) {
//!         assert!(arbiter.accept(fix, FixSource::Instrument));
//!     }
//! }
//! assert!(arbiter.current_fix().is_some());
//! ```

pub mod ais;
pub mod collision;
pub mod config;
pub mod error;
pub mod geo;
pub mod nmea;
pub mod position;

// Re-export commonly used types
pub use ais::{AisIngestor, AisTarget, PartialReport, TargetSnapshot};
pub use collision::{compute, compute_warnings, CollisionWarning, CpaResult, RiskLevel};
pub use config::Config;
pub use error::DecodeError;
pub use nmea::{decode, Reading};
pub use position::{FixSource, NavigationFix, PositionArbiter, TrackPoint, Verdict};
