//! Device location sensor
//!
//! The fallback position source. A [`LocationSensor`] yields fixes as the device
//! reports them; the [`SensorFeed`] forwards them to the position service, which
//! decides whether they are used.
//!
//! A sensor that fails only ends its own feed; the instrument feed is unaffected.

use std::future::Future;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use seawatch_core::geo::MS_TO_KN;
use seawatch_core::position::NavigationFix;

use crate::feed::{LineReader, Source, TextLines};
use crate::position::PositionEvent;
use crate::ServerError;

/// A location update as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters per second
    pub speed_mps: Option<f64>,
    /// Degrees true
    pub course: Option<f64>,
    /// Horizontal accuracy in meters
    pub accuracy: Option<f64>,
    /// Milliseconds since Unix epoch
    pub timestamp: u64,
}

impl From<SensorFix> for NavigationFix {
    fn from(s: SensorFix) -> Self {
        NavigationFix {
            latitude: s.latitude,
            longitude: s.longitude,
            timestamp: s.timestamp,
            speed_over_ground: s.speed_mps.map(|v| v * MS_TO_KN),
            course_over_ground: s.course,
            fix_quality: None,
            horizontal_accuracy: s.accuracy,
        }
    }
}

#[async_trait]
pub trait LocationSensor: Send {
    /// Wait for the next fix. `None` once the sensor has stopped.
    async fn next_fix(&mut self) -> Result<Option<SensorFix>, ServerError>;
}

/// Sensor reading one JSON encoded [`SensorFix`] per line
pub struct JsonLinesSensor {
    lines: TextLines,
}

impl JsonLinesSensor {
    pub fn new(reader: LineReader) -> Self {
        JsonLinesSensor {
            lines: TextLines::new(reader),
        }
    }

    pub async fn open(source: &Source) -> Result<Self, ServerError> {
        Ok(Self::new(source.open().await?))
    }
}

#[async_trait]
impl LocationSensor for JsonLinesSensor {
    async fn next_fix(&mut self) -> Result<Option<SensorFix>, ServerError> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(fix) => return Ok(Some(fix)),
                Err(e) => log::warn!("sensor: invalid fix: {}", e),
            }
        }
        Ok(None)
    }
}

pub struct SensorFeed<S: LocationSensor> {
    key: String,
    sensor: S,
    tx: mpsc::Sender<PositionEvent>,
}

impl<S: LocationSensor> SensorFeed<S> {
    pub fn new(sensor: S, tx: mpsc::Sender<PositionEvent>) -> Self {
        SensorFeed {
            key: "sensor".to_string(),
            sensor,
            tx,
        }
    }

    /// Run as a subsystem. A failed sensor is logged and ends only this feed.
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        let key = self.key.clone();
        if let Err(e) = self.process(subsys.on_shutdown_requested()).await {
            log::warn!("{}: feed stopped: {}", key, e);
        }
        Ok(())
    }

    pub async fn process(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);
        log::debug!("{}: started", self.key);

        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                r = self.sensor.next_fix() => match r? {
                    Some(fix) => {
                        if self.tx.send(PositionEvent::SensorFix(fix.into())).await.is_err() {
                            return Err(ServerError::ServiceGone("position"));
                        }
                    }
                    None => {
                        log::info!("{}: sensor stopped", self.key);
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Open a JSON lines sensor on `source` and feed it to the position service
pub async fn run_json_sensor(
    source: Source,
    tx: mpsc::Sender<PositionEvent>,
    subsys: SubsystemHandle,
) -> Result<(), ServerError> {
    match JsonLinesSensor::open(&source).await {
        Ok(sensor) => SensorFeed::new(sensor, tx).run(subsys).await,
        Err(e) => {
            log::warn!("sensor {}: cannot open: {}", source, e);
            Ok(())
        }
    }
}
