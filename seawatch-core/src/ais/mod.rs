//! AIS Target Ingestor
//!
//! Buffers partial AIS reports and merges them into the target registry in
//! batches. The owner drives two clocks:
//!
//! - **flush** (default every 500 ms): applies all buffered reports in arrival
//!   order, then evicts the least recently updated targets beyond capacity
//!
//! The batch itself is bounded too: when the flush clock stops, the oldest
//! buffered reports are dropped once `max_pending` is reached.
//! - **sweep** (default every 2 minutes): removes targets not updated within the
//!   staleness threshold
//!
//! The ingestor itself has no timers and never reads the clock; `now` is passed
//! in, which keeps it deterministic under test.
//!
//! # Example
//!
//! ```
//! use seawatch_core::ais::{AisIngestor, PartialReport, PositionReport};
//! use seawatch_core::config::AisConfig;
//!
//! let mut ingestor = AisIngestor::new(AisConfig::default());
//! ingestor.ingest(PartialReport::Position(PositionReport {
//!     mmsi: 244_660_000,
//!     timestamp: 1_000,
//!     latitude: Some(51.95),
//!     longitude: Some(4.05),
//!     ..Default::default()
//! }));
//! assert!(ingestor.targets().is_empty());
//!
//! ingestor.flush_batch(1_500);
//! assert_eq!(ingestor.targets().len(), 1);
//! ```

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::{AisConfig, BoundingBox};

mod registry;
mod report;

pub use registry::{TargetRegistry, TargetSnapshot};
pub use report::{
    AisTarget, Dimensions, PartialReport, PositionReport, StaticReport, HEADING_NOT_AVAILABLE,
};

/// What a flush changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushOutcome {
    /// Reports merged
    pub applied: usize,
    /// Targets seen for the first time
    pub created: usize,
    /// MMSIs dropped to stay within capacity
    pub evicted: Vec<u32>,
    /// Buffered reports discarded since the previous flush because the batch
    /// was full
    pub dropped: usize,
}

pub struct AisIngestor {
    config: AisConfig,
    pending: VecDeque<PartialReport>,
    dropped: usize,
    registry: TargetRegistry,
}

impl AisIngestor {
    pub fn new(config: AisConfig) -> Self {
        AisIngestor {
            config,
            pending: VecDeque::new(),
            dropped: 0,
            registry: TargetRegistry::new(config.capacity),
        }
    }

    pub fn config(&self) -> &AisConfig {
        &self.config
    }

    /// Buffer a report until the next flush.
    ///
    /// A full batch makes room by discarding its oldest report, which a later
    /// report for the same vessel most likely supersedes anyway.
    pub fn ingest(&mut self, report: PartialReport) {
        if self.pending.len() >= self.config.max_pending.max(1) {
            self.pending.pop_front();
            self.dropped += 1;
        }
        self.pending.push_back(report);
    }

    /// Number of reports waiting for the next flush
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Apply all buffered reports in arrival order, then enforce capacity.
    ///
    /// Reports without a timestamp (0) are stamped with `now`.
    pub fn flush_batch(&mut self, now: u64) -> FlushOutcome {
        let mut outcome = FlushOutcome {
            dropped: std::mem::take(&mut self.dropped),
            ..FlushOutcome::default()
        };
        if self.pending.is_empty() {
            return outcome;
        }

        for mut report in std::mem::take(&mut self.pending) {
            if report.timestamp() == 0 {
                stamp(&mut report, now);
            }
            if self.registry.apply(&report) {
                outcome.created += 1;
            }
            outcome.applied += 1;
        }
        outcome.evicted = self.registry.evict_over_capacity();
        outcome
    }

    /// Remove targets whose last update is older than the staleness threshold.
    ///
    /// Returns the number of targets removed.
    pub fn sweep_stale(&mut self, now: u64) -> usize {
        self.registry.remove_stale(now, self.config.stale_after_ms)
    }

    /// Load previously persisted targets.
    ///
    /// Stale targets are discarded and the capacity bound applies. Returns the
    /// number of targets kept.
    pub fn restore<I>(&mut self, targets: I, now: u64) -> usize
    where
        I: IntoIterator<Item = AisTarget>,
    {
        for target in targets {
            if target.is_fresh(now, self.config.stale_after_ms) {
                self.registry.insert(target);
            }
        }
        self.registry.evict_over_capacity();
        self.registry.len()
    }

    /// Current targets as an immutable shared snapshot
    pub fn targets(&self) -> TargetSnapshot {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }
}

fn stamp(report: &mut PartialReport, now: u64) {
    match report {
        PartialReport::Position(r) => r.timestamp = now,
        PartialReport::Static(r) => r.timestamp = now,
    }
}

/// Check a report against the optional geographic filter.
///
/// Static reports and position reports without coordinates always pass.
pub fn within_bounds(report: &PartialReport, bounding_box: Option<&BoundingBox>) -> bool {
    match (bounding_box, report.position()) {
        (Some(bbox), Some((latitude, longitude))) => bbox.contains(latitude, longitude),
        _ => true,
    }
}
