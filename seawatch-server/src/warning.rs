//! Collision warning service
//!
//! Recomputes the warning list whenever own ship's position or the AIS target
//! snapshot changes, and publishes it as an ordered, immutable list.

use std::collections::BTreeSet;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_graceful_shutdown::SubsystemHandle;

use seawatch_core::ais::TargetSnapshot;
use seawatch_core::collision::{compute_warnings, CollisionWarning, RiskLevel};
use seawatch_core::config::CollisionConfig;

use crate::position::PositionSnapshot;
use crate::ServerError;

pub type Warnings = Arc<Vec<CollisionWarning>>;

pub struct WarningService {
    key: String,
    config: CollisionConfig,
    position_rx: watch::Receiver<PositionSnapshot>,
    targets_rx: watch::Receiver<TargetSnapshot>,
    warnings_tx: watch::Sender<Warnings>,
    dangerous: BTreeSet<u32>,
}

impl WarningService {
    pub fn new(
        config: CollisionConfig,
        position_rx: watch::Receiver<PositionSnapshot>,
        targets_rx: watch::Receiver<TargetSnapshot>,
    ) -> (WarningService, watch::Receiver<Warnings>) {
        let (warnings_tx, warnings_rx) = watch::channel(Arc::new(Vec::new()));
        let service = WarningService {
            key: "warnings".to_string(),
            config,
            position_rx,
            targets_rx,
            warnings_tx,
            dangerous: BTreeSet::new(),
        };
        (service, warnings_rx)
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        self.process(subsys.on_shutdown_requested()).await
    }

    pub async fn process(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        self.recompute();

        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                r = self.position_rx.changed() => {
                    if r.is_err() {
                        log::debug!("{}: position service gone", self.key);
                        return Ok(());
                    }
                    self.recompute();
                },
                r = self.targets_rx.changed() => {
                    if r.is_err() {
                        log::debug!("{}: ais service gone", self.key);
                        return Ok(());
                    }
                    self.recompute();
                },
            }
        }
    }

    fn recompute(&mut self) {
        let fix = self.position_rx.borrow_and_update().fix;
        let targets = Arc::clone(&self.targets_rx.borrow_and_update());

        let warnings = match fix {
            Some(own) => compute_warnings(&own, &targets, &self.config),
            None => Vec::new(),
        };
        self.log_new_dangers(&warnings);
        self.warnings_tx.send_replace(Arc::new(warnings));
    }

    fn log_new_dangers(&mut self, warnings: &[CollisionWarning]) {
        let dangerous: BTreeSet<u32> = warnings
            .iter()
            .filter(|w| w.risk == RiskLevel::Danger)
            .map(|w| w.mmsi)
            .collect();

        for w in warnings.iter().filter(|w| w.risk == RiskLevel::Danger) {
            if !self.dangerous.contains(&w.mmsi) {
                log::warn!(
                    "{}: {} {} CPA {:.2} nm in {:.1} min, bearing {:03.0} range {:.2} nm",
                    self.key,
                    w.mmsi,
                    w.name.as_deref().unwrap_or(""),
                    w.cpa_nm,
                    w.tcpa_min,
                    w.bearing_deg,
                    w.range_nm
                );
            }
        }
        self.dangerous = dangerous;
    }
}

/// Print every new warning list to stdout as one JSON line
pub async fn forward_output(
    mut warnings_rx: watch::Receiver<Warnings>,
    subsys: SubsystemHandle,
) -> Result<(), ServerError> {
    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            r = warnings_rx.changed() => {
                if r.is_err() {
                    return Ok(());
                }
                let warnings = Arc::clone(&warnings_rx.borrow_and_update());
                write_warnings(&mut std::io::stdout().lock(), &warnings)?;
            }
        }
    }
}

/// Write a warning list as one line of JSON
pub fn write_warnings(out: &mut impl Write, warnings: &[CollisionWarning]) -> Result<(), ServerError> {
    let json = serde_json::to_string(warnings)?;
    writeln!(out, "{}", json)?;
    out.flush()?;
    Ok(())
}
