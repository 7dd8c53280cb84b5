use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use miette::{IntoDiagnostic, Result, WrapErr};
use tokio_graceful_shutdown::Toplevel;

use seawatch_server::settings;
use seawatch_server::store::{JsonFileStore, TargetStore};
use seawatch_server::{start_services, Cli, Source};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let config = settings::load_config(args.config.as_deref())
        .into_diagnostic()
        .wrap_err("Cannot load configuration")?;

    let store: Option<Arc<dyn TargetStore>> = if args.no_persist {
        None
    } else {
        match args.targets_file.clone().or_else(settings::default_targets_path) {
            Some(path) => {
                log::info!("AIS targets are saved in {}", path.display());
                Some(Arc::new(JsonFileStore::new(path)))
            }
            None => {
                log::warn!("No data directory, AIS targets are not saved");
                None
            }
        }
    };

    log::info!(
        "Starting: instrument {}, sensor {}, ais {}",
        describe(&args.instrument),
        describe(&args.sensor),
        describe(&args.ais)
    );

    Toplevel::new(move |s| async move {
        start_services(&s, &args, config, store);
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(2000))
    .await
    .into_diagnostic()
    .wrap_err("Shutdown failed")
}

fn describe(source: &Option<Source>) -> String {
    source
        .as_ref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}
