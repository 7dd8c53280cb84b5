//! Instrument feed
//!
//! Reads NMEA 0183 sentences line by line, decodes them and forwards position fixes
//! to the position service. Decoder failures only show up in the published
//! [`InstrumentStatus`]; the next line is processed as if nothing happened.
//!
//! A source that cannot be opened, or fails while reading, only ends this feed.
//! The position service carries on with the device sensor as fallback.
//!
//! GGA carries no speed or course and RMC carries no HDOP, so the
//! [`FixAssembler`] fills those in from recent VTG and GGA sentences.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant};
use tokio_graceful_shutdown::SubsystemHandle;

use seawatch_core::nmea::{
    decode, CourseSpeedReading, DepthReading, HeadingReading, PositionReading, Reading,
    WindReading, WindReference,
};
use seawatch_core::position::NavigationFix;
use seawatch_core::DecodeError;

use crate::feed::Source;
use crate::position::PositionEvent;
use crate::{now_millis, ServerError};

/// Readings older than this are not merged into a fix (milliseconds)
const MERGE_WINDOW_MS: u64 = 2000;

/// Interval between instrument status log lines
pub const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Counters and latest readings of the instrument feed
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentStatus {
    pub connected: bool,
    pub sentences: u64,
    pub decoded: u64,
    pub unsupported: u64,
    pub format_errors: u64,
    pub checksum_errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind: Option<WindReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<DepthReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<HeadingReading>,
}

impl fmt::Display for InstrumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sentences, {} decoded, {} unsupported, {} format errors, {} checksum errors",
            self.sentences, self.decoded, self.unsupported, self.format_errors, self.checksum_errors
        )?;
        if let Some(wind) = &self.wind {
            if let (Some(angle), Some(speed)) = (wind.angle, wind.speed_knots) {
                let reference = match wind.reference {
                    Some(WindReference::True) => "T",
                    _ => "R",
                };
                write!(f, "; wind {:03.0}{} {:.1} kn", angle, reference, speed)?;
            }
        }
        if let Some(depth) = self.depth.as_ref().and_then(|d| d.adjusted_depth()) {
            write!(f, "; depth {:.1} m", depth)?;
        }
        if let Some(heading) = &self.heading {
            match (heading.true_heading(), heading.heading) {
                (Some(h), _) => write!(f, "; heading {:05.1} T", h)?,
                (None, Some(h)) => write!(f, "; heading {:05.1} M", h)?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

/// Combines position, course/speed and quality sentences of one epoch into fixes
#[derive(Debug, Default)]
pub struct FixAssembler {
    course_speed: Option<(CourseSpeedReading, u64)>,
    accuracy: Option<(f64, u64)>,
}

impl FixAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn course_speed(&mut self, reading: CourseSpeedReading, now: u64) {
        self.course_speed = Some((reading, now));
    }

    /// Turn a position reading into a fix, completed with recent readings
    pub fn position(&mut self, reading: &PositionReading, now: u64) -> Option<NavigationFix> {
        if let Some(accuracy) = reading.horizontal_accuracy() {
            self.accuracy = Some((accuracy, now));
        }
        let mut fix = reading.to_fix(now)?;

        if fix.speed_over_ground.is_none() || fix.course_over_ground.is_none() {
            if let Some((cs, _)) = recent(&self.course_speed, now) {
                fix.speed_over_ground = fix.speed_over_ground.or(cs.speed_knots);
                fix.course_over_ground = fix.course_over_ground.or(cs.course_true);
            }
        }
        if fix.horizontal_accuracy.is_none() {
            fix.horizontal_accuracy = recent(&self.accuracy, now).map(|(a, _)| *a);
        }
        Some(fix)
    }
}

fn recent<T>(value: &Option<(T, u64)>, now: u64) -> Option<&(T, u64)> {
    value
        .as_ref()
        .filter(|(_, at)| now.saturating_sub(*at) <= MERGE_WINDOW_MS)
}

pub struct InstrumentFeed {
    key: String,
    source: Source,
    tx: mpsc::Sender<PositionEvent>,
    status_tx: watch::Sender<InstrumentStatus>,
    assembler: FixAssembler,
}

impl InstrumentFeed {
    pub fn new(
        source: Source,
        tx: mpsc::Sender<PositionEvent>,
    ) -> (InstrumentFeed, watch::Receiver<InstrumentStatus>) {
        let (status_tx, status_rx) = watch::channel(InstrumentStatus::default());
        let feed = InstrumentFeed {
            key: format!("instrument {}", source),
            source,
            tx,
            status_tx,
            assembler: FixAssembler::new(),
        };
        (feed, status_rx)
    }

    /// Run as a subsystem. A failed source is logged and ends only this feed.
    pub async fn run(self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        let key = self.key.clone();
        if let Err(e) = self.process(subsys.on_shutdown_requested()).await {
            log::warn!("{}: feed stopped: {}", key, e);
        }
        Ok(())
    }

    /// Read the source until it ends or `shutdown` completes.
    ///
    /// There is a single connection attempt and no reconnection.
    pub async fn process(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        tokio::pin!(shutdown);

        let mut lines = match self.source.open_lines().await {
            Ok(lines) => lines,
            Err(e) => {
                log::error!("{}: cannot open: {}", self.key, e);
                self.status_tx
                    .send_modify(|s| s.last_error = Some(e.to_string()));
                return Err(e);
            }
        };
        log::info!("{}: connected", self.key);
        self.set_connected(true).await?;

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::debug!("{}: shutdown", self.key);
                    break Ok(());
                },
                r = lines.next_line() => match r {
                    Ok(Some(line)) => {
                        if let Some(fix) = self.handle_line(&line, now_millis()) {
                            self.send(PositionEvent::InstrumentFix(fix)).await?;
                        }
                    }
                    Ok(None) => {
                        log::info!("{}: end of stream", self.key);
                        break Ok(());
                    }
                    Err(e) => {
                        log::error!("{}: read error: {}", self.key, e);
                        self.status_tx
                            .send_modify(|s| s.last_error = Some(e.to_string()));
                        break Err(ServerError::Io(e));
                    }
                }
            }
        };

        self.set_connected(false).await?;
        log::info!("{}: {}", self.key, *self.status_tx.borrow());
        result
    }

    async fn set_connected(&mut self, connected: bool) -> Result<(), ServerError> {
        self.status_tx.send_modify(|s| s.connected = connected);
        self.send(PositionEvent::InstrumentConnected(connected)).await
    }

    async fn send(&self, event: PositionEvent) -> Result<(), ServerError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ServerError::ServiceGone("position"))
    }

    /// Decode one line, update the status and return a fix when one is complete
    pub fn handle_line(&mut self, line: &str, now: u64) -> Option<NavigationFix> {
        if line.trim().is_empty() {
            return None;
        }
        let decoded = decode(line);
        let mut fix = None;

        match &decoded {
            Ok(Some(Reading::Position(p))) => fix = self.assembler.position(p, now),
            Ok(Some(Reading::CourseSpeed(cs))) => self.assembler.course_speed(*cs, now),
            Ok(_) => {}
            Err(e) => log::trace!("{}: {}: {}", self.key, e, line.trim()),
        }

        self.status_tx.send_modify(|s| {
            s.sentences += 1;
            match decoded {
                Ok(Some(reading)) => {
                    s.decoded += 1;
                    match reading {
                        Reading::Wind(w) => s.wind = Some(w),
                        Reading::Depth(d) => s.depth = Some(d),
                        Reading::Heading(h) => s.heading = Some(h),
                        Reading::Position(_) | Reading::CourseSpeed(_) => {}
                    }
                }
                Ok(None) => s.unsupported += 1,
                Err(e) => {
                    match e {
                        DecodeError::InvalidFormat(_) => s.format_errors += 1,
                        DecodeError::ChecksumFailed { .. } => s.checksum_errors += 1,
                    }
                    s.last_error = Some(e.to_string());
                }
            }
        });
        fix
    }
}

/// Log the instrument status every `period` while sentences keep arriving
pub async fn log_status(
    status_rx: watch::Receiver<InstrumentStatus>,
    period: Duration,
    subsys: SubsystemHandle,
) -> Result<(), ServerError> {
    let mut interval = interval_at(Instant::now() + period, period);
    let mut reported = 0;

    loop {
        tokio::select! {
            _ = subsys.on_shutdown_requested() => return Ok(()),
            _ = interval.tick() => {
                let status = status_rx.borrow().clone();
                if status.sentences != reported {
                    reported = status.sentences;
                    log::info!("instrument: {}", status);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use seawatch_core::nmea::PositionSentence;

    const RMC: &str = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
    const GGA: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
    const VTG: &str = "$GPVTG,054.7,T,034.4,M,005.5,N,010.2,K*48";

    fn feed() -> (InstrumentFeed, watch::Receiver<InstrumentStatus>, mpsc::Receiver<PositionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let (feed, status) = InstrumentFeed::new(Source::Stdin, tx);
        (feed, status, rx)
    }

    #[test]
    fn test_gga_fix_completed_with_vtg() {
        let (mut feed, _status, _rx) = feed();
        assert!(feed.handle_line(VTG, 1_000).is_none());

        let fix = feed.handle_line(GGA, 1_500).unwrap();
        assert_eq!(fix.speed_over_ground, Some(5.5));
        assert_eq!(fix.course_over_ground, Some(54.7));
        assert!((fix.horizontal_accuracy.unwrap() - 4.5).abs() < 1e-9);
        assert_eq!(fix.fix_quality, Some(1));
    }

    #[test]
    fn test_old_vtg_is_not_merged() {
        let (mut feed, _status, _rx) = feed();
        feed.handle_line(VTG, 1_000);
        let fix = feed.handle_line(GGA, 10_000).unwrap();
        assert_eq!(fix.speed_over_ground, None);
    }

    #[test]
    fn test_rmc_fix_takes_accuracy_from_gga() {
        let (mut feed, _status, _rx) = feed();
        feed.handle_line(GGA, 1_000);
        let fix = feed.handle_line(RMC, 1_200).unwrap();
        assert_eq!(fix.speed_over_ground, Some(22.4));
        assert!((fix.horizontal_accuracy.unwrap() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_status_counters() {
        let (mut feed, status, _rx) = feed();
        feed.handle_line(RMC, 0);
        feed.handle_line("$GPRMC,123519,A*00", 0);
        feed.handle_line("GPRMC,123519", 0);
        feed.handle_line("$GPGSV,3,1,11,03,03,111,00*4A", 0);
        feed.handle_line("$IIMWV,045.0,R,12.5,N,A*0A", 0);
        feed.handle_line("", 0);

        let s = status.borrow();
        assert_eq!(s.sentences, 5);
        assert_eq!(s.decoded, 2);
        assert_eq!(s.unsupported, 1);
        assert_eq!(s.checksum_errors, 1);
        assert_eq!(s.format_errors, 1);
        assert!(s.last_error.is_some());
        assert_eq!(s.wind.unwrap().speed_knots, Some(12.5));
    }

    #[test]
    fn test_errors_do_not_stop_decoding() {
        let (mut feed, _status, _rx) = feed();
        assert!(feed.handle_line("$GPRMC,garbage*00", 0).is_none());
        assert!(feed.handle_line(RMC, 1).is_some());
    }

    #[test]
    fn test_void_fix_not_forwarded() {
        let (mut feed, _status, _rx) = feed();
        assert!(feed.handle_line("$GPRMC,123519,V,4807.038,N,01131.000,E,,,230394,,", 0).is_none());
    }

    #[test]
    fn test_assembler_keeps_own_motion() {
        let mut assembler = FixAssembler::new();
        assembler.course_speed(
            CourseSpeedReading {
                course_true: Some(10.0),
                course_magnetic: None,
                speed_knots: Some(1.0),
            },
            0,
        );
        let mut reading = PositionReading {
            sentence: PositionSentence::Rmc,
            time: None,
            date: None,
            latitude: Some(1.0),
            longitude: Some(2.0),
            valid: Some(true),
            fix_quality: None,
            satellites: None,
            hdop: None,
            altitude_m: None,
            speed_over_ground: Some(6.0),
            course_over_ground: Some(200.0),
            magnetic_variation: None,
        };
        let fix = assembler.position(&reading, 100).unwrap();
        assert_eq!(fix.speed_over_ground, Some(6.0));
        assert_eq!(fix.course_over_ground, Some(200.0));

        reading.course_over_ground = None;
        let fix = assembler.position(&reading, 100).unwrap();
        assert_eq!(fix.course_over_ground, Some(10.0));
    }

    #[tokio::test]
    async fn test_feed_reads_file_and_reports_connection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", RMC).unwrap();
        writeln!(file, "$GPRMC,broken*00").unwrap();
        writeln!(file, "{}", GGA).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (feed, status) = InstrumentFeed::new(Source::File(file.path().to_path_buf()), tx);
        feed.process(std::future::pending::<()>()).await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], PositionEvent::InstrumentConnected(true));
        assert!(matches!(events[1], PositionEvent::InstrumentFix(_)));
        assert!(matches!(events[2], PositionEvent::InstrumentFix(_)));
        assert_eq!(events[3], PositionEvent::InstrumentConnected(false));

        let s = status.borrow();
        assert!(!s.connected);
        assert_eq!(s.sentences, 3);
        assert_eq!(s.checksum_errors, 1);
    }

    #[tokio::test]
    async fn test_line_noise_does_not_stop_feed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", RMC).unwrap();
        file.write_all(b"$GPRMC,\xff\xfe noise\r\n").unwrap();
        writeln!(file, "{}", RMC).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (feed, status) = InstrumentFeed::new(Source::File(file.path().to_path_buf()), tx);
        feed.process(std::future::pending::<()>()).await.unwrap();

        let mut fixes = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, PositionEvent::InstrumentFix(_)) {
                fixes += 1;
            }
        }
        assert_eq!(fixes, 2);

        let s = status.borrow();
        assert_eq!(s.sentences, 3);
        assert_eq!(s.decoded, 2);
        assert_eq!(s.format_errors, 1);
    }

    #[test]
    fn test_status_summary() {
        let (mut feed, status, _rx) = feed();
        feed.handle_line("$IIMWV,045.0,R,12.5,N,A*0A", 0);
        feed.handle_line("$SDDPT,12.3,0.5*62", 0);
        feed.handle_line("$GPHDT,274.07,T*03", 0);
        feed.handle_line("$GPRMC,123519,A*00", 0);

        assert_eq!(
            status.borrow().to_string(),
            "4 sentences, 3 decoded, 0 unsupported, 0 format errors, 1 checksum errors; \
             wind 045R 12.5 kn; depth 12.8 m; heading 274.1 T"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let (tx, _rx) = mpsc::channel(16);
        let (feed, status) =
            InstrumentFeed::new(Source::File("/nonexistent/seawatch.nmea".into()), tx);
        assert!(feed.process(std::future::pending::<()>()).await.is_err());
        assert!(status.borrow().last_error.is_some());
    }
}
