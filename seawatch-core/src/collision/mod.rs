//! CPA/TCPA Collision Prediction
//!
//! Closest Point of Approach (CPA) and Time to CPA (TCPA) between own ship and
//! AIS targets, assuming both keep their current course and speed.
//!
//! Positions are projected onto a flat east/north plane centred on own ship, in
//! nautical miles, with velocities in knots. With relative position `r` and
//! relative velocity `v` (target minus own ship):
//!
//! ```text
//! TCPA = -(r . v) / |v|^2          (hours)
//! CPA  = |r + v * TCPA|           (nautical miles)
//! ```
//!
//! A negative TCPA means the closest approach is already behind us.
//!
//! # Example
//!
//! ```
//! use seawatch_core::ais::AisTarget;
//! use seawatch_core::collision::compute;
//! use seawatch_core::position::NavigationFix;
//!
//! // Heading north at 10 knots, target 5 nm ahead heading south at 10 knots
//! let own = NavigationFix::new(0.0, 0.0, 0).with_motion(10.0, 0.0);
//! let mut target = AisTarget::new(244_000_001, 0);
//! target.latitude = Some(5.0 / 60.0);
//! target.longitude = Some(0.0);
//! target.speed_over_ground = Some(10.0);
//! target.course_over_ground = Some(180.0);
//!
//! let cpa = compute(&own, &target).unwrap();
//! assert!(cpa.cpa_nm < 0.01);
//! assert!((cpa.tcpa_min - 15.0).abs() < 0.1);
//! ```

use std::collections::BTreeMap;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::ais::AisTarget;
use crate::config::CollisionConfig;
use crate::geo::{bearing_degrees, local_offset_nm, velocity_components};
use crate::position::NavigationFix;

/// Relative speeds below this (knots squared) count as no relative motion
const MIN_RELATIVE_SPEED_SQ: f64 = 1e-9;

/// Closest approach between own ship and one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpaResult {
    /// Distance at closest approach (nautical miles)
    pub cpa_nm: f64,
    /// Time until closest approach (minutes), negative when already past
    pub tcpa_min: f64,
    /// Current distance to the target (nautical miles)
    pub range_nm: f64,
    /// Current bearing to the target (degrees true)
    pub bearing_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Danger,
    Warning,
    Safe,
}

impl RiskLevel {
    /// Classify a result against the configured thresholds.
    ///
    /// Only approaches in the future and within the time horizon raise a risk.
    pub fn classify(result: &CpaResult, config: &CollisionConfig) -> Self {
        let upcoming = result.tcpa_min > 0.0 && result.tcpa_min <= config.max_tcpa_min;
        if upcoming && result.cpa_nm < config.danger_cpa_nm {
            RiskLevel::Danger
        } else if upcoming && result.cpa_nm < config.warning_cpa_nm {
            RiskLevel::Warning
        } else {
            RiskLevel::Safe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionWarning {
    pub mmsi: u32,
    pub cpa_nm: f64,
    pub tcpa_min: f64,
    pub risk: RiskLevel,
    pub range_nm: f64,
    pub bearing_deg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Compute CPA and TCPA between own ship and a target.
///
/// Returns `None` unless own ship speed and course are known and the target has a
/// position, speed and course.
pub fn compute(own: &NavigationFix, target: &AisTarget) -> Option<CpaResult> {
    let own_velocity = velocity(own.speed_over_ground?, own.course_over_ground?);
    let target_velocity = velocity(target.speed_over_ground?, target.course_over_ground?);
    let (latitude, longitude) = target.position()?;

    let (east, north) = local_offset_nm(own.latitude, own.longitude, latitude, longitude);
    let r = Vector2::new(east, north);
    let v = target_velocity - own_velocity;
    let range_nm = r.norm();

    let speed_sq = v.norm_squared();
    let (cpa_nm, tcpa_hours) = if speed_sq < MIN_RELATIVE_SPEED_SQ {
        // No relative motion: the range never changes
        (range_nm, 0.0)
    } else {
        let tcpa = -r.dot(&v) / speed_sq;
        ((r + v * tcpa).norm(), tcpa)
    };

    Some(CpaResult {
        cpa_nm,
        tcpa_min: tcpa_hours * 60.0,
        range_nm,
        bearing_deg: bearing_degrees(east, north),
    })
}

fn velocity(speed_knots: f64, course_deg: f64) -> Vector2<f64> {
    let (east, north) = velocity_components(speed_knots, course_deg);
    Vector2::new(east, north)
}

/// Compute warnings for all targets.
///
/// Targets without enough data, and targets whose closest approach is not in the
/// future, are left out. The result is ordered by CPA, closest first, with TCPA
/// breaking ties.
pub fn compute_warnings(
    own: &NavigationFix,
    targets: &BTreeMap<u32, AisTarget>,
    config: &CollisionConfig,
) -> Vec<CollisionWarning> {
    let mut warnings: Vec<CollisionWarning> = targets
        .values()
        .filter_map(|target| {
            let result = compute(own, target)?;
            if result.tcpa_min.is_nan() || result.tcpa_min <= 0.0 {
                return None;
            }
            Some(CollisionWarning {
                mmsi: target.mmsi,
                cpa_nm: result.cpa_nm,
                tcpa_min: result.tcpa_min,
                risk: RiskLevel::classify(&result, config),
                range_nm: result.range_nm,
                bearing_deg: result.bearing_deg,
                name: target.name.clone(),
            })
        })
        .collect();

    rank(&mut warnings);
    warnings
}

/// Order by CPA, closest first, then by TCPA, soonest first
pub fn rank(warnings: &mut [CollisionWarning]) {
    warnings.sort_by(|a, b| {
        a.cpa_nm
            .total_cmp(&b.cpa_nm)
            .then(a.tcpa_min.total_cmp(&b.tcpa_min))
    });
}

/// Highest risk in a warning list
pub fn highest_risk(warnings: &[CollisionWarning]) -> Option<RiskLevel> {
    warnings.iter().map(|w| w.risk).min()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(mmsi: u32, north_nm: f64, east_nm: f64, sog: f64, cog: f64) -> AisTarget {
        let mut t = AisTarget::new(mmsi, 0);
        t.latitude = Some(north_nm / 60.0);
        t.longitude = Some(east_nm / 60.0);
        t.speed_over_ground = Some(sog);
        t.course_over_ground = Some(cog);
        t
    }

    fn own(sog: f64, cog: f64) -> NavigationFix {
        NavigationFix::new(0.0, 0.0, 0).with_motion(sog, cog)
    }

    #[test]
    fn test_head_on() {
        let result = compute(&own(10.0, 0.0), &target(1, 5.0, 0.0, 10.0, 180.0)).unwrap();
        assert!(result.cpa_nm < 1e-6);
        assert!(result.tcpa_min.is_finite());
        assert!((result.tcpa_min - 15.0).abs() < 1e-6);
        assert!((result.range_nm - 5.0).abs() < 1e-6);
        assert!(result.bearing_deg.abs() < 1e-6);
    }

    #[test]
    fn test_diverging_has_negative_tcpa() {
        let result = compute(&own(10.0, 0.0), &target(1, -2.0, 0.0, 10.0, 180.0)).unwrap();
        assert!(result.tcpa_min < 0.0);
        assert!((result.range_nm - 2.0).abs() < 1e-6);

        let warnings = compute_warnings(
            &own(10.0, 0.0),
            &BTreeMap::from([(1, target(1, -2.0, 0.0, 10.0, 180.0))]),
            &CollisionConfig::default(),
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_crossing() {
        // Target 3 nm east heading west at 10 knots, own ship heading north at 10 knots
        let result = compute(&own(10.0, 0.0), &target(1, 0.0, 3.0, 10.0, 270.0)).unwrap();
        assert!((result.tcpa_min - 9.0).abs() < 1e-6);
        assert!((result.cpa_nm - 3.0 / 2f64.sqrt()).abs() < 1e-6);
        assert!((result.bearing_deg - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_same_course_and_speed() {
        let result = compute(&own(8.0, 45.0), &target(1, 1.0, 1.0, 8.0, 45.0)).unwrap();
        assert_eq!(result.tcpa_min, 0.0);
        assert!((result.cpa_nm - result.range_nm).abs() < 1e-12);
    }

    #[test]
    fn test_missing_data_gives_none() {
        let mut t = target(1, 1.0, 0.0, 5.0, 180.0);
        t.course_over_ground = None;
        assert!(compute(&own(10.0, 0.0), &t).is_none());

        let t = target(1, 1.0, 0.0, 5.0, 180.0);
        assert!(compute(&NavigationFix::new(0.0, 0.0, 0), &t).is_none());

        let mut t = target(1, 1.0, 0.0, 5.0, 180.0);
        t.longitude = None;
        assert!(compute(&own(10.0, 0.0), &t).is_none());
    }

    #[test]
    fn test_risk_levels() {
        let config = CollisionConfig::default();
        let result = |cpa_nm, tcpa_min| CpaResult {
            cpa_nm,
            tcpa_min,
            range_nm: 3.0,
            bearing_deg: 0.0,
        };
        assert_eq!(RiskLevel::classify(&result(0.2, 10.0), &config), RiskLevel::Danger);
        assert_eq!(RiskLevel::classify(&result(0.7, 10.0), &config), RiskLevel::Warning);
        assert_eq!(RiskLevel::classify(&result(1.5, 10.0), &config), RiskLevel::Safe);
        assert_eq!(RiskLevel::classify(&result(0.2, 45.0), &config), RiskLevel::Safe);
        assert_eq!(RiskLevel::classify(&result(0.2, -5.0), &config), RiskLevel::Safe);
        assert_eq!(RiskLevel::classify(&result(0.2, 30.0), &config), RiskLevel::Danger);
    }

    #[test]
    fn test_warnings_sorted_by_cpa() {
        // Three southbound targets ahead, offset east by 2, 0.3 and 0.8 nm
        let targets = BTreeMap::from([
            (1, target(1, 5.0, 2.0, 10.0, 180.0)),
            (2, target(2, 5.0, 0.3, 10.0, 180.0)),
            (3, target(3, 5.0, 0.8, 10.0, 180.0)),
        ]);
        let warnings = compute_warnings(&own(10.0, 0.0), &targets, &CollisionConfig::default());

        let order: Vec<u32> = warnings.iter().map(|w| w.mmsi).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert!(warnings.windows(2).all(|w| w[0].cpa_nm <= w[1].cpa_nm));
        assert_eq!(warnings[0].risk, RiskLevel::Danger);
        assert_eq!(warnings[1].risk, RiskLevel::Warning);
        assert_eq!(warnings[2].risk, RiskLevel::Safe);
        assert_eq!(highest_risk(&warnings), Some(RiskLevel::Danger));
    }

    #[test]
    fn test_equal_cpa_ordered_by_tcpa() {
        let warning = |mmsi, cpa_nm, tcpa_min| CollisionWarning {
            mmsi,
            cpa_nm,
            tcpa_min,
            risk: RiskLevel::Danger,
            range_nm: 2.0,
            bearing_deg: 0.0,
            name: None,
        };
        let mut warnings = vec![warning(1, 0.3, 12.0), warning(2, 0.3, 4.0), warning(3, 0.1, 20.0)];
        rank(&mut warnings);
        let order: Vec<u32> = warnings.iter().map(|w| w.mmsi).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_rank_is_total_with_nan() {
        let warning = |mmsi, cpa_nm: f64| CollisionWarning {
            mmsi,
            cpa_nm,
            tcpa_min: 5.0,
            risk: RiskLevel::Safe,
            range_nm: 2.0,
            bearing_deg: 0.0,
            name: None,
        };
        let mut warnings = vec![warning(1, f64::NAN), warning(2, 0.8), warning(3, 0.2)];
        rank(&mut warnings);
        let order: Vec<u32> = warnings.iter().map(|w| w.mmsi).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }
}
