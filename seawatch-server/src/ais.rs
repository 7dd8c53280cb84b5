//! AIS service and report feed
//!
//! The [`AisService`] owns the [`AisIngestor`] and its two periodic timers. Reports,
//! timer ticks and timer control all arrive through one queue, so the registry is
//! only ever touched from the service task. The target snapshot is republished
//! whenever a flush or sweep changes it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_graceful_shutdown::SubsystemHandle;

use seawatch_core::ais::{within_bounds, AisIngestor, PartialReport, TargetSnapshot};
use seawatch_core::config::{AisConfig, BoundingBox};

use crate::feed::Source;
use crate::store::TargetStore;
use crate::timer::PeriodicTimer;
use crate::{now_millis, ServerError};

const QUEUE_SIZE: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum AisCommand {
    Report(PartialReport),
    Flush,
    Sweep,
    StartTimers,
    StopTimers,
}

#[derive(Clone)]
pub struct AisHandle {
    tx: mpsc::Sender<AisCommand>,
    snapshot_rx: watch::Receiver<TargetSnapshot>,
}

impl AisHandle {
    pub fn sender(&self) -> mpsc::Sender<AisCommand> {
        self.tx.clone()
    }

    pub async fn send(&self, command: AisCommand) -> Result<(), ServerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ServerError::ServiceGone("ais"))
    }

    pub fn subscribe(&self) -> watch::Receiver<TargetSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn targets(&self) -> TargetSnapshot {
        Arc::clone(&self.snapshot_rx.borrow())
    }
}

pub struct AisService {
    key: String,
    ingestor: AisIngestor,
    tx: mpsc::Sender<AisCommand>,
    rx: mpsc::Receiver<AisCommand>,
    flush_timer: PeriodicTimer,
    sweep_timer: PeriodicTimer,
    snapshot_tx: watch::Sender<TargetSnapshot>,
    store: Option<Arc<dyn TargetStore>>,
}

impl AisService {
    pub fn new(config: AisConfig, store: Option<Arc<dyn TargetStore>>) -> (AisService, AisHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let ingestor = AisIngestor::new(config);
        let (snapshot_tx, snapshot_rx) = watch::channel(ingestor.targets());
        let service = AisService {
            key: "ais".to_string(),
            ingestor,
            tx: tx.clone(),
            rx,
            flush_timer: PeriodicTimer::new(
                "ais flush",
                Duration::from_millis(config.flush_interval_ms),
            ),
            sweep_timer: PeriodicTimer::new(
                "ais sweep",
                Duration::from_millis(config.sweep_interval_ms),
            ),
            snapshot_tx,
            store,
        };
        (service, AisHandle { tx, snapshot_rx })
    }

    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        self.process(subsys.on_shutdown_requested()).await
    }

    /// Restore saved targets, start the timers and handle commands until
    /// `shutdown` completes. The registry is saved again on the way out.
    pub async fn process(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);

        self.restore().await;
        self.start_timers();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::debug!("{}: shutdown", self.key);
                    break;
                },
                Some(command) = self.rx.recv() => self.handle_command(command),
            }
        }

        self.stop_timers();
        self.save().await;
        Ok(())
    }

    fn handle_command(&mut self, command: AisCommand) {
        match command {
            AisCommand::Report(report) => self.ingestor.ingest(report),
            AisCommand::Flush => {
                let outcome = self.ingestor.flush_batch(now_millis());
                if outcome.dropped > 0 {
                    log::warn!("{}: batch full, dropped {} reports", self.key, outcome.dropped);
                }
                if outcome.applied > 0 {
                    log::trace!(
                        "{}: merged {} reports, {} new targets, {} evicted",
                        self.key,
                        outcome.applied,
                        outcome.created,
                        outcome.evicted.len()
                    );
                    self.publish();
                }
            }
            AisCommand::Sweep => {
                let removed = self.ingestor.sweep_stale(now_millis());
                if removed > 0 {
                    log::debug!("{}: removed {} stale targets", self.key, removed);
                    self.publish();
                }
            }
            AisCommand::StartTimers => self.start_timers(),
            AisCommand::StopTimers => self.stop_timers(),
        }
    }

    fn start_timers(&mut self) {
        self.flush_timer.start(self.tx.clone(), || AisCommand::Flush);
        self.sweep_timer.start(self.tx.clone(), || AisCommand::Sweep);
    }

    fn stop_timers(&mut self) {
        self.flush_timer.stop();
        self.sweep_timer.stop();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.ingestor.targets());
    }

    async fn restore(&mut self) {
        let Some(store) = &self.store else {
            return;
        };
        match store.load().await {
            Ok(targets) => {
                let saved = targets.len();
                let kept = self.ingestor.restore(targets, now_millis());
                log::info!("{}: restored {} of {} saved targets", self.key, kept, saved);
                if kept > 0 {
                    self.publish();
                }
            }
            Err(e) => {
                log::warn!("{}: ignoring saved targets: {}", self.key, e);
            }
        }
    }

    async fn save(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.ingestor.targets(), now_millis()).await {
                log::error!("{}: failed to save targets: {}", self.key, e);
            }
        }
    }
}

/// Reads JSON encoded [`PartialReport`]s, one per line, into the AIS service
pub struct AisFeed {
    key: String,
    source: Source,
    bounding_box: Option<BoundingBox>,
    tx: mpsc::Sender<AisCommand>,
}

impl AisFeed {
    pub fn new(source: Source, bounding_box: Option<BoundingBox>, tx: mpsc::Sender<AisCommand>) -> Self {
        AisFeed {
            key: format!("ais feed {}", source),
            source,
            bounding_box,
            tx,
        }
    }

    /// Run as a subsystem. A failed source is logged and ends only this feed.
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        let key = self.key.clone();
        if let Err(e) = self.process(subsys.on_shutdown_requested()).await {
            log::warn!("{}: feed stopped: {}", key, e);
        }
        Ok(())
    }

    pub async fn process(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        let mut lines = match self.source.open_lines().await {
            Ok(lines) => lines,
            Err(e) => {
                log::error!("{}: cannot open: {}", self.key, e);
                return Err(e);
            }
        };
        log::debug!("{}: reading reports", self.key);

        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                r = lines.next_line() => match r {
                    Ok(Some(line)) => {
                        if let Some(report) = self.parse(&line) {
                            if self.tx.send(AisCommand::Report(report)).await.is_err() {
                                return Err(ServerError::ServiceGone("ais"));
                            }
                        }
                    }
                    Ok(None) => {
                        log::info!("{}: end of stream", self.key);
                        return Ok(());
                    }
                    Err(e) => {
                        log::error!("{}: read error: {}", self.key, e);
                        return Err(ServerError::Io(e));
                    }
                }
            }
        }
    }

    fn parse(&self, line: &str) -> Option<PartialReport> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<PartialReport>(line) {
            Ok(report) if within_bounds(&report, self.bounding_box.as_ref()) => Some(report),
            Ok(report) => {
                log::trace!("{}: {} outside bounding box", self.key, report.mmsi());
                None
            }
            Err(e) => {
                log::warn!("{}: invalid report: {}", self.key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use seawatch_core::ais::{AisTarget, PositionReport};
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::store::JsonFileStore;

    fn report(mmsi: u32, timestamp: u64) -> PartialReport {
        PartialReport::Position(PositionReport {
            mmsi,
            timestamp,
            latitude: Some(52.0),
            longitude: Some(4.0),
            ..Default::default()
        })
    }

    fn slow_timers() -> AisConfig {
        AisConfig {
            flush_interval_ms: 60_000,
            sweep_interval_ms: 60_000,
            ..AisConfig::default()
        }
    }

    async fn changed(rx: &mut watch::Receiver<TargetSnapshot>) -> TargetSnapshot {
        timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("targets not published")
            .unwrap();
        Arc::clone(&rx.borrow_and_update())
    }

    #[tokio::test]
    async fn test_reports_published_after_flush() {
        let (service, handle) = AisService::new(slow_timers(), None);
        let token = CancellationToken::new();
        let task = tokio::spawn(service.process(token.clone().cancelled_owned()));
        let mut rx = handle.subscribe();

        handle.send(AisCommand::Report(report(1, now_millis()))).await.unwrap();
        handle.send(AisCommand::Report(report(2, now_millis()))).await.unwrap();
        assert!(handle.targets().is_empty());

        handle.send(AisCommand::Flush).await.unwrap();
        let targets = changed(&mut rx).await;
        assert_eq!(targets.len(), 2);

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_flush_timer_drives_batches() {
        let config = AisConfig {
            flush_interval_ms: 10,
            ..AisConfig::default()
        };
        let (service, handle) = AisService::new(config, None);
        let token = CancellationToken::new();
        let task = tokio::spawn(service.process(token.clone().cancelled_owned()));
        let mut rx = handle.subscribe();

        handle.send(AisCommand::Report(report(7, now_millis()))).await.unwrap();
        let targets = changed(&mut rx).await;
        assert!(targets.contains_key(&7));

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_targets() {
        let (service, handle) = AisService::new(slow_timers(), None);
        let token = CancellationToken::new();
        let task = tokio::spawn(service.process(token.clone().cancelled_owned()));
        let mut rx = handle.subscribe();

        let now = now_millis();
        handle.send(AisCommand::Report(report(1, now - 11 * 60_000))).await.unwrap();
        handle.send(AisCommand::Report(report(2, now - 9 * 60_000))).await.unwrap();
        handle.send(AisCommand::Flush).await.unwrap();
        assert_eq!(changed(&mut rx).await.len(), 2);

        handle.send(AisCommand::Sweep).await.unwrap();
        let targets = changed(&mut rx).await;
        assert!(!targets.contains_key(&1));
        assert!(targets.contains_key(&2));

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_targets_restored_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let store: Arc<dyn TargetStore> = Arc::new(JsonFileStore::new(&path));

        let now = now_millis();
        let saved = Arc::new(std::collections::BTreeMap::from([
            (1, AisTarget::new(1, now - 11 * 60_000)),
            (2, AisTarget::new(2, now - 60_000)),
        ]));
        store.save(&saved, now).await.unwrap();

        let (service, handle) = AisService::new(slow_timers(), Some(Arc::clone(&store)));
        let token = CancellationToken::new();
        let task = tokio::spawn(service.process(token.clone().cancelled_owned()));
        let mut rx = handle.subscribe();

        let targets = changed(&mut rx).await;
        assert_eq!(targets.keys().copied().collect::<Vec<_>>(), vec![2]);

        handle.send(AisCommand::Report(report(3, now_millis()))).await.unwrap();
        handle.send(AisCommand::Flush).await.unwrap();
        changed(&mut rx).await;

        token.cancel();
        task.await.unwrap().unwrap();

        let reloaded = store.load().await.unwrap();
        let mmsis: Vec<u32> = reloaded.iter().map(|t| t.mmsi).collect();
        assert_eq!(mmsis, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_corrupt_store_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(&path, "not json").unwrap();
        let store: Arc<dyn TargetStore> = Arc::new(JsonFileStore::new(&path));

        let (service, handle) = AisService::new(slow_timers(), Some(store));
        let token = CancellationToken::new();
        let task = tokio::spawn(service.process(token.clone().cancelled_owned()));

        handle.send(AisCommand::Flush).await.unwrap();
        assert!(handle.targets().is_empty());

        token.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_feed_filters_and_forwards_reports() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"kind":"position","mmsi":1,"timestamp":5,"latitude":52.0,"longitude":4.0}}"#
        )
        .unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(
            file,
            r#"{{"kind":"position","mmsi":2,"timestamp":5,"latitude":10.0,"longitude":4.0}}"#
        )
        .unwrap();
        file.write_all(b"{\"kind\":\"static\",\"mmsi\":3,\"name\":\"\xff\"}\n").unwrap();
        writeln!(file, r#"{{"kind":"static","mmsi":2,"timestamp":6,"name":"FAR"}}"#).unwrap();

        let bbox = BoundingBox {
            min_latitude: 50.0,
            min_longitude: 3.0,
            max_latitude: 54.0,
            max_longitude: 6.0,
        };
        let (tx, mut rx) = mpsc::channel(16);
        let feed = AisFeed::new(Source::File(file.path().to_path_buf()), Some(bbox), tx);
        feed.process(std::future::pending::<()>()).await.unwrap();

        let mut forwarded = Vec::new();
        while let Ok(AisCommand::Report(report)) = rx.try_recv() {
            forwarded.push((report.mmsi(), report.timestamp()));
        }
        assert_eq!(forwarded, vec![(1, 5), (3, 0), (2, 6)]);
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let (tx, _rx) = mpsc::channel(16);
        let feed = AisFeed::new(Source::File("/nonexistent/seawatch.ais".into()), None, tx);
        assert!(matches!(
            feed.process(std::future::pending::<()>()).await,
            Err(ServerError::Io(_))
        ));
    }
}
