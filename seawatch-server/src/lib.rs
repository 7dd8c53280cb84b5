//! Seawatch Server
//!
//! Runs the navigation core as a set of services, one tokio task per stateful
//! component:
//!
//! - **position**: owns the position arbiter, fed by the instrument feed and the
//!   device location sensor
//! - **ais**: owns the AIS ingestor with its flush and sweep timers, fed by the AIS
//!   report stream
//! - **warnings**: recomputes collision warnings whenever own ship or the targets
//!   change
//!
//! Services communicate through bounded queues and publish immutable snapshots on
//! watch channels. The feeds reading collaborator streams end on their own when
//! their source fails; the services keep running until shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tokio::sync::watch;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

use seawatch_core::Config;

pub mod ais;
pub mod error;
pub mod feed;
pub mod instrument;
pub mod position;
pub mod sensor;
pub mod settings;
pub mod store;
pub mod timer;
pub mod warning;

pub use error::ServerError;
pub use feed::Source;

use ais::{AisFeed, AisHandle, AisService};
use instrument::{InstrumentFeed, InstrumentStatus, STATUS_LOG_INTERVAL};
use position::{PositionHandle, PositionService};
use store::TargetStore;
use warning::{forward_output, WarningService, Warnings};

#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// NMEA 0183 instrument stream: tcp://host:port, a file or '-' for stdin
    #[arg(short, long)]
    pub instrument: Option<Source>,

    /// Device location sensor stream, JSON lines
    #[arg(short, long)]
    pub sensor: Option<Source>,

    /// AIS report stream, JSON lines
    #[arg(short, long)]
    pub ais: Option<Source>,

    /// File the AIS targets are saved to between runs
    #[arg(long)]
    pub targets_file: Option<PathBuf>,

    /// Do not restore or save AIS targets
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,

    /// Write every collision warning list to stdout as JSON
    #[arg(long, default_value_t = false)]
    pub output: bool,
}

/// Handles to the services started by [`start_services`]
pub struct Services {
    pub position: PositionHandle,
    pub ais: AisHandle,
    pub warnings: watch::Receiver<Warnings>,
    pub instrument: Option<watch::Receiver<InstrumentStatus>>,
}

/// Start the services, and a feed for every source given on the command line
pub fn start_services(
    subsys: &SubsystemHandle,
    args: &Cli,
    config: Config,
    store: Option<Arc<dyn TargetStore>>,
) -> Services {
    let (position, position_handle) = PositionService::new(config.arbiter);
    let (ais, ais_handle) = AisService::new(config.ais, store);
    let (warnings, warnings_rx) = WarningService::new(
        config.collision,
        position_handle.subscribe(),
        ais_handle.subscribe(),
    );

    subsys.start(SubsystemBuilder::new("position", |s| position.run(s)));
    subsys.start(SubsystemBuilder::new("ais", |s| ais.run(s)));
    subsys.start(SubsystemBuilder::new("warnings", |s| warnings.run(s)));

    let mut instrument_status = None;
    if let Some(source) = args.instrument.clone() {
        let (feed, status_rx) = InstrumentFeed::new(source, position_handle.sender());
        subsys.start(SubsystemBuilder::new("instrument", |s| feed.run(s)));

        let log_rx = status_rx.clone();
        subsys.start(SubsystemBuilder::new("instrument status", move |s| {
            instrument::log_status(log_rx, STATUS_LOG_INTERVAL, s)
        }));
        instrument_status = Some(status_rx);
    }

    if let Some(source) = args.sensor.clone() {
        let tx = position_handle.sender();
        subsys.start(SubsystemBuilder::new("sensor", move |s| {
            sensor::run_json_sensor(source, tx, s)
        }));
    }

    if let Some(source) = args.ais.clone() {
        let feed = AisFeed::new(source, config.ais.bounding_box, ais_handle.sender());
        subsys.start(SubsystemBuilder::new("ais feed", |s| feed.run(s)));
    }

    if args.output {
        let output_rx = warnings_rx.clone();
        subsys.start(SubsystemBuilder::new("stdout", move |s| {
            forward_output(output_rx, s)
        }));
    }

    Services {
        position: position_handle,
        ais: ais_handle,
        warnings: warnings_rx,
        instrument: instrument_status,
    }
}

/// Milliseconds since Unix epoch
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
