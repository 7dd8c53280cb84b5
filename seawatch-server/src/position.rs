//! Position service
//!
//! Single owner of the [`PositionArbiter`]. Fix sources send [`PositionEvent`]s
//! into its queue; every accepted fix is published as a new [`PositionSnapshot`]
//! on a watch channel.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_graceful_shutdown::SubsystemHandle;

use seawatch_core::config::ArbiterConfig;
use seawatch_core::position::{FixSource, NavigationFix, PositionArbiter, TrackPoint, Verdict};

use crate::ServerError;

const QUEUE_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionEvent {
    InstrumentFix(NavigationFix),
    InstrumentConnected(bool),
    SensorFix(NavigationFix),
}

/// Published state of own ship
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSnapshot {
    pub fix: Option<NavigationFix>,
    pub source: Option<FixSource>,
    pub instrument_connected: bool,
    pub track: Arc<Vec<TrackPoint>>,
}

/// Cloneable access to a running [`PositionService`]
#[derive(Clone)]
pub struct PositionHandle {
    tx: mpsc::Sender<PositionEvent>,
    snapshot_rx: watch::Receiver<PositionSnapshot>,
}

impl PositionHandle {
    pub fn sender(&self) -> mpsc::Sender<PositionEvent> {
        self.tx.clone()
    }

    pub async fn send(&self, event: PositionEvent) -> Result<(), ServerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServerError::ServiceGone("position"))
    }

    pub fn subscribe(&self) -> watch::Receiver<PositionSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        self.snapshot_rx.borrow().clone()
    }
}

pub struct PositionService {
    key: String,
    arbiter: PositionArbiter,
    rx: mpsc::Receiver<PositionEvent>,
    snapshot_tx: watch::Sender<PositionSnapshot>,
    track_len: usize,
    track_last: Option<TrackPoint>,
    track: Arc<Vec<TrackPoint>>,
}

impl PositionService {
    pub fn new(config: ArbiterConfig) -> (PositionService, PositionHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let (snapshot_tx, snapshot_rx) = watch::channel(PositionSnapshot::default());
        let service = PositionService {
            key: "position".to_string(),
            arbiter: PositionArbiter::new(config),
            rx,
            snapshot_tx,
            track_len: 0,
            track_last: None,
            track: Arc::new(Vec::new()),
        };
        (service, PositionHandle { tx, snapshot_rx })
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        self.process(subsys.on_shutdown_requested()).await
    }

    /// Handle events until `shutdown` completes.
    ///
    /// When every source has gone the last snapshot stays published.
    pub async fn process(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        log::debug!("{}: started", self.key);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::debug!("{}: shutdown", self.key);
                    return Ok(());
                },
                r = self.rx.recv() => match r {
                    Some(event) => self.handle_event(event),
                    None => {
                        log::info!("{}: no fix sources left", self.key);
                        (&mut shutdown).await;
                        return Ok(());
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: PositionEvent) {
        let (fix, source) = match event {
            PositionEvent::InstrumentConnected(connected) => {
                if connected != self.arbiter.instrument_connected() {
                    log::info!(
                        "{}: instrument feed {}",
                        self.key,
                        if connected { "connected" } else { "disconnected, using sensor fallback" }
                    );
                    self.arbiter.set_instrument_connected(connected);
                    self.publish();
                }
                return;
            }
            PositionEvent::InstrumentFix(fix) => (fix, FixSource::Instrument),
            PositionEvent::SensorFix(fix) => (fix, FixSource::DeviceSensor),
        };

        match self.arbiter.submit(fix, source) {
            Verdict::Accepted => self.publish(),
            verdict => {
                log::trace!("{}: {:?} fix ignored: {:?}", self.key, source, verdict);
            }
        }
    }

    fn publish(&mut self) {
        let track = self.arbiter.track_history();
        if track.len() != self.track_len || track.last() != self.track_last.as_ref() {
            self.track_len = track.len();
            self.track_last = track.last().copied();
            self.track = Arc::new(track.to_vec());
        }

        let snapshot = PositionSnapshot {
            fix: self.arbiter.current_fix().copied(),
            source: self.arbiter.current_source(),
            instrument_connected: self.arbiter.instrument_connected(),
            track: Arc::clone(&self.track),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}
