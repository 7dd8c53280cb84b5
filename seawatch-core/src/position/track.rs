//! Own ship track history
//!
//! Fixed capacity ring buffer of positions. A point is only admitted once the
//! vessel has moved at least the minimum separation from the last recorded point,
//! so a boat lying at anchor does not flush the history with GPS jitter.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::NavigationFix;
use crate::geo::distance_meters;

/// A recorded position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
}

impl From<&NavigationFix> for TrackPoint {
    fn from(fix: &NavigationFix) -> Self {
        TrackPoint {
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackHistory {
    points: VecDeque<TrackPoint>,
    capacity: usize,
    min_separation_m: f64,
}

impl TrackHistory {
    pub fn new(capacity: usize, min_separation_m: f64) -> Self {
        TrackHistory {
            points: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            min_separation_m,
        }
    }

    /// Record `fix` if it is far enough from the last point.
    ///
    /// Returns true when a point was added. The oldest point is dropped when the
    /// buffer is full.
    pub fn admit(&mut self, fix: &NavigationFix) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if let Some(last) = self.points.back() {
            let moved = distance_meters(last.latitude, last.longitude, fix.latitude, fix.longitude);
            if moved < self.min_separation_m {
                return false;
            }
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TrackPoint::from(fix));
        true
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently recorded point
    pub fn last(&self) -> Option<&TrackPoint> {
        self.points.back()
    }

    /// Points from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &TrackPoint> + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<TrackPoint> {
        self.points.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(latitude: f64, longitude: f64, timestamp: u64) -> NavigationFix {
        NavigationFix::new(latitude, longitude, timestamp)
    }

    #[test]
    fn test_first_point_always_recorded() {
        let mut track = TrackHistory::new(10, 5.0);
        assert!(track.admit(&fix(50.0, 1.0, 0)));
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_jitter_is_not_recorded() {
        let mut track = TrackHistory::new(10, 5.0);
        track.admit(&fix(50.0, 1.0, 0));
        // ~1.1 m steps
        for i in 1..4 {
            assert!(!track.admit(&fix(50.0 + i as f64 * 0.00001, 1.0, i * 1000)));
        }
        assert_eq!(track.len(), 1);
    }

    #[test]
    fn test_separation_measured_from_last_recorded_point() {
        let mut track = TrackHistory::new(10, 5.0);
        track.admit(&fix(50.0, 1.0, 0));
        // Drift of 3.3 m, then 6.7 m from the recorded point
        assert!(!track.admit(&fix(50.00003, 1.0, 1000)));
        assert!(track.admit(&fix(50.00006, 1.0, 2000)));
        assert_eq!(track.len(), 2);
        assert_eq!(track.last().unwrap().timestamp, 2000);
    }

    #[test]
    fn test_oldest_point_dropped_when_full() {
        let mut track = TrackHistory::new(3, 5.0);
        for i in 0..5u64 {
            track.admit(&fix(50.0 + i as f64 * 0.001, 1.0, i));
        }
        assert_eq!(track.len(), 3);
        let timestamps: Vec<u64> = track.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_records_nothing() {
        let mut track = TrackHistory::new(0, 5.0);
        assert!(!track.admit(&fix(50.0, 1.0, 0)));
        assert!(track.is_empty());
    }
}
