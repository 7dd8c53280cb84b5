//! Tunable thresholds for the navigation core
//!
//! Every field has a default, so a partial JSON document (or none at all) yields a
//! complete configuration. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Complete configuration for all core components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub arbiter: ArbiterConfig,
    pub ais: AisConfig,
    pub collision: CollisionConfig,
}

impl Config {
    /// Parse a configuration from JSON, filling in defaults for missing fields
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Position arbiter plausibility and track settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArbiterConfig {
    /// Fixes reporting a worse horizontal accuracy than this are rejected (meters)
    pub max_accuracy_m: f64,
    /// Maximum realistic speed between consecutive fixes (m/s, ~97 knots)
    pub max_speed_mps: f64,
    /// Number of track points retained
    pub track_capacity: usize,
    /// Minimum distance between recorded track points (meters)
    pub min_track_separation_m: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        ArbiterConfig {
            max_accuracy_m: 50.0,
            max_speed_mps: 50.0,
            track_capacity: 1000,
            min_track_separation_m: 5.0,
        }
    }
}

/// Geographic filter for incoming AIS position reports
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    /// Check if a position lies inside the box (edges inclusive)
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }
}

/// AIS ingestor batching, capacity and staleness settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AisConfig {
    /// Maximum number of targets kept in the registry
    pub capacity: usize,
    /// Interval between batch flushes (milliseconds)
    pub flush_interval_ms: u64,
    /// Interval between staleness sweeps (milliseconds)
    pub sweep_interval_ms: u64,
    /// Targets not updated for longer than this are removed (milliseconds)
    pub stale_after_ms: u64,
    /// Reports buffered between flushes before the oldest are dropped
    pub max_pending: usize,
    /// Only position reports inside this box are ingested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl Default for AisConfig {
    fn default() -> Self {
        AisConfig {
            capacity: 500,
            flush_interval_ms: 500,
            sweep_interval_ms: 2 * 60 * 1000,
            stale_after_ms: 10 * 60 * 1000,
            max_pending: 10_000,
            bounding_box: None,
        }
    }
}

/// Collision risk thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollisionConfig {
    /// CPA below this raises a warning (nautical miles)
    pub warning_cpa_nm: f64,
    /// CPA below this raises a danger (nautical miles)
    pub danger_cpa_nm: f64,
    /// Only closest approaches within this horizon count (minutes)
    pub max_tcpa_min: f64,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        CollisionConfig {
            warning_cpa_nm: 1.0,
            danger_cpa_nm: 0.5,
            max_tcpa_min: 30.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.arbiter.max_accuracy_m, 50.0);
        assert_eq!(config.arbiter.track_capacity, 1000);
        assert_eq!(config.ais.capacity, 500);
        assert_eq!(config.ais.flush_interval_ms, 500);
        assert_eq!(config.ais.sweep_interval_ms, 120_000);
        assert_eq!(config.ais.stale_after_ms, 600_000);
        assert_eq!(config.ais.max_pending, 10_000);
        assert_eq!(config.collision.danger_cpa_nm, 0.5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Config::from_json(
            r#"{ "ais": { "capacity": 50, "boundingBox": {
                "minLatitude": 50.0, "minLongitude": 3.0,
                "maxLatitude": 53.0, "maxLongitude": 6.0 } },
                "collision": { "warningCpaNm": 2.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.ais.capacity, 50);
        assert_eq!(config.ais.flush_interval_ms, 500);
        assert_eq!(config.collision.warning_cpa_nm, 2.0);
        assert_eq!(config.collision.danger_cpa_nm, 0.5);
        assert_eq!(config.arbiter, ArbiterConfig::default());

        let bbox = config.ais.bounding_box.unwrap();
        assert!(bbox.contains(52.0, 4.5));
        assert!(!bbox.contains(54.0, 4.5));
    }

    #[test]
    fn test_empty_json() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }
}
