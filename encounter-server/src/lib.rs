//! # Encounter Server
//!
//! AIS encounter collector with buffered persistence.
//!
//! This crate wires [`encounter_core`] to the outside world:
//! - Reads newline-delimited AIS JSON messages from a file or stdin
//! - Runs every decoded report through the [`EncounterEngine`]
//! - Buffers the resulting records and writes them to a [`store::RecordStore`]
//!   in batches
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    encounter-server                      │
//! │  ┌─────────────┐   mpsc    ┌──────────────────────────┐  │
//! │  │ input       │──────────►│ pipeline                 │  │
//! │  │ (lines)     │  String   │  ais::decode             │  │
//! │  └─────────────┘           │  EncounterEngine         │  │
//! │                            └────────────┬─────────────┘  │
//! │                                         │ Record         │
//! │                                         ▼                │
//! │  ┌─────────────┐  flush_if_due ┌───────────────────────┐ │
//! │  │ flush timer │──────────────►│ RecordBuffer          │ │
//! │  └─────────────┘               │  (batch / interval)   │ │
//! │                                └───────────┬───────────┘ │
//! │                                            ▼             │
//! │                                ┌───────────────────────┐ │
//! │                                │ RecordStore (jsonl)   │ │
//! │                                └───────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each box with a task runs as a `tokio-graceful-shutdown` subsystem. On
//! shutdown (signal or end of input) the pipeline closes every open
//! encounter and performs a final flush before the process exits.
//!
//! ## Example: Running the Collector
//!
//! ```rust,no_run
//! use encounter_server::config::Config;
//! use encounter_server::input::InputSource;
//! use encounter_server::store::JsonLinesStore;
//! use encounter_server::Collector;
//! use std::time::Duration;
//! use tokio_graceful_shutdown::Toplevel;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let store = JsonLinesStore::open("/tmp/encounters").await.unwrap();
//!     let collector = Collector::new(&config, InputSource::Stdin, store).unwrap();
//!
//!     Toplevel::new(move |s| async move {
//!         collector.start(&s);
//!     })
//!     .catch_signals()
//!     .handle_shutdown_requests(Duration::from_secs(10))
//!     .await
//!     .unwrap();
//! }
//! ```
//!
//! ## Command-Line Interface
//!
//! See [`Cli`] for all available options. Key options:
//!
//! - `-i, --input` - Message file, stdin when omitted
//! - `-c, --config` - JSON configuration file
//! - `-d, --data-dir` - Output directory for the `.jsonl` tables
//! - `-v` - Increase verbosity (use multiple times)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use encounter_core::{EncounterEngine, SystemClock};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle};

pub mod ais;
pub mod buffer;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod store;

use buffer::RecordBuffer;
use config::Config;
use error::ConfigError;
use input::InputSource;
use pipeline::Pipeline;
use store::RecordStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lines waiting between the reader and the pipeline
const INPUT_QUEUE: usize = 1024;

#[derive(Parser, Clone, Debug)]
#[command(version, about)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// Newline-delimited AIS JSON messages; `-` or nothing reads stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the .jsonl table files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Seconds between statistics log lines, overrides the config file
    #[arg(long)]
    pub stats_interval: Option<u64>,
}

/// Everything the collector subsystems need, built before the runtime
/// starts them
pub struct Collector<S: RecordStore> {
    engine: EncounterEngine<SystemClock>,
    buffer: Arc<RecordBuffer<S>>,
    input: InputSource,
    stats_interval: Duration,
}

impl<S: RecordStore + 'static> Collector<S> {
    pub fn new(config: &Config, input: InputSource, store: S) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Collector {
            engine: EncounterEngine::with_system_clock(config.encounters.clone())?,
            buffer: Arc::new(RecordBuffer::from_settings(store, &config.buffer)),
            input,
            stats_interval: config.stats_interval(),
        })
    }

    /// Start the input, flush timer and pipeline subsystems
    pub fn start(self, subsystem: &SubsystemHandle) {
        let Collector {
            engine,
            buffer,
            input: source,
            stats_interval,
        } = self;
        let (tx, rx) = mpsc::channel(INPUT_QUEUE);
        let pipeline = Pipeline::new(engine, buffer.clone(), stats_interval);

        subsystem.start(SubsystemBuilder::new("Input", move |subsys| {
            input::run_reader(source, tx, subsys)
        }));
        subsystem.start(SubsystemBuilder::new("FlushTimer", move |subsys| async move {
            buffer.run_flush_timer(subsys).await
        }));
        subsystem.start(SubsystemBuilder::new("Pipeline", move |subsys| {
            pipeline.run(rx, subsys)
        }));
    }
}
