//! Capacity bounded target registry
//!
//! Targets are kept in an `Arc`'d map. Readers take a cheap clone of the `Arc`;
//! the registry only copies the map when it is mutated while a snapshot is still
//! held somewhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::report::{AisTarget, PartialReport};

/// Immutable view of all targets, keyed by MMSI
pub type TargetSnapshot = Arc<BTreeMap<u32, AisTarget>>;

#[derive(Debug, Clone)]
pub struct TargetRegistry {
    targets: TargetSnapshot,
    capacity: usize,
}

impl TargetRegistry {
    pub fn new(capacity: usize) -> Self {
        TargetRegistry {
            targets: Arc::new(BTreeMap::new()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn get(&self, mmsi: u32) -> Option<&AisTarget> {
        self.targets.get(&mmsi)
    }

    pub fn snapshot(&self) -> TargetSnapshot {
        Arc::clone(&self.targets)
    }

    /// Merge `report` into its target, creating the target on first sighting.
    ///
    /// Returns true when a new target was created.
    pub fn apply(&mut self, report: &PartialReport) -> bool {
        let targets = Arc::make_mut(&mut self.targets);
        match targets.get_mut(&report.mmsi()) {
            Some(target) => {
                report.merge_into(target);
                false
            }
            None => {
                targets.insert(report.mmsi(), report.to_target());
                true
            }
        }
    }

    /// Insert or replace a complete target
    pub fn insert(&mut self, target: AisTarget) {
        Arc::make_mut(&mut self.targets).insert(target.mmsi, target);
    }

    /// Drop the least recently updated targets until the registry fits its
    /// capacity. On equal update times the higher MMSI goes first.
    ///
    /// Returns the evicted MMSIs.
    pub fn evict_over_capacity(&mut self) -> Vec<u32> {
        let excess = self.targets.len().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }

        let mut by_age: Vec<(u64, u32)> = self
            .targets
            .values()
            .map(|t| (t.last_update, t.mmsi))
            .collect();
        by_age.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let evicted: Vec<u32> = by_age.into_iter().take(excess).map(|(_, mmsi)| mmsi).collect();
        let targets = Arc::make_mut(&mut self.targets);
        for mmsi in &evicted {
            targets.remove(mmsi);
        }
        evicted
    }

    /// Remove every target not updated within `stale_after_ms` of `now`.
    ///
    /// Returns the number of targets removed.
    pub fn remove_stale(&mut self, now: u64, stale_after_ms: u64) -> usize {
        if self.targets.values().all(|t| t.is_fresh(now, stale_after_ms)) {
            return 0;
        }
        let before = self.targets.len();
        Arc::make_mut(&mut self.targets).retain(|_, t| t.is_fresh(now, stale_after_ms));
        before - self.targets.len()
    }
}
