use std::time::Duration;

use clap::Parser;
use log::info;
use miette::{IntoDiagnostic, Result};
use tokio_graceful_shutdown::Toplevel;

use encounter_server::config::{default_data_dir, Config};
use encounter_server::input::InputSource;
use encounter_server::store::JsonLinesStore;
use encounter_server::{Cli, Collector, VERSION};

/// Time allowed for the final flush once shutdown starts
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let mut config = Config::load(args.config.as_deref()).into_diagnostic()?;
    if let Some(stats_interval) = args.stats_interval {
        config.stats_interval_s = stats_interval;
    }

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir().into_diagnostic()?,
    };
    let store = JsonLinesStore::open(data_dir).await.into_diagnostic()?;
    let input = InputSource::from_arg(args.input);

    info!(
        "encounter-server {} starting: start {} NM, end {} NM, batch {} records / {} s",
        VERSION,
        config.encounters.start_distance_nm,
        config.encounters.end_distance_nm,
        config.buffer.batch_size,
        config.buffer.flush_interval_s
    );

    let collector = Collector::new(&config, input, store).into_diagnostic()?;

    Toplevel::new(move |s| async move {
        collector.start(&s);
    })
    .catch_signals()
    .handle_shutdown_requests(SHUTDOWN_TIMEOUT)
    .await
    .into_diagnostic()
}
