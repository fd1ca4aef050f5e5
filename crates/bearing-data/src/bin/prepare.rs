//! `prepare` binary: builds and normalizes the bearing spectrogram loaders.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin prepare
//! cargo run --bin prepare -- --config prepare.json --log-level debug
//! cargo run --bin prepare -- --adapter npy-folder --data-dir /data/cwru
//! cargo run --bin prepare -- --list-adapters
//! ```

use bearing_data::config::PipelineConfig;
use bearing_data::pipeline::{Partition, Pipeline};
use bearing_data::registry::registered_adapters;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments for the prepare binary.
#[derive(Parser, Debug)]
#[command(
    name = "prepare",
    version,
    about = "Bearing spectrogram dataset pipeline",
    long_about = None
)]
struct Args {
    /// Path to a JSON pipeline configuration.
    ///
    /// If not provided, the default `PipelineConfig` is used.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the registered source adapter.
    #[arg(long, value_name = "NAME")]
    adapter: Option<String>,

    /// Override the data directory.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the registered adapter names and exit.
    #[arg(long, default_value_t = false)]
    list_adapters: bool,
}

fn main() {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    if args.list_adapters {
        for name in registered_adapters() {
            println!("{name}");
        }
        return;
    }

    info!("Bearing data pipeline v{}", bearing_data::VERSION);

    let mut config = match args.config.as_deref() {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            match PipelineConfig::from_json(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    error!("Failed to load configuration: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("No configuration file provided, using defaults");
            PipelineConfig::default()
        }
    };

    if let Some(adapter) = args.adapter {
        // Keep the data directory in step with the adapter unless one is given.
        if args.config.is_none() && args.data_dir.is_none() {
            config.data_dir = PathBuf::from("data").join(&adapter);
        }
        config.adapter = adapter;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {e}");
        std::process::exit(1);
    }

    info!("  adapter      : {}", config.adapter);
    info!("  data dir     : {}", config.data_dir.display());
    info!("  image size   : {}x{}", config.image_size[0], config.image_size[1]);
    info!(
        "  segment/stft : seg {} win {} hop {} ({:?})",
        config.seg_length, config.win_length, config.hop_length, config.window
    );
    info!("  fractions    : {:?}", config.fractions);
    info!("  batch size   : {} ({} workers)", config.batch_size, config.num_workers);
    info!("  n_sigma      : {}{}", config.n_sigma, if config.min_max_scale { " + min-max" } else { "" });

    let mut pipeline = match Pipeline::from_registry(&config.adapter) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = pipeline.run(&config) {
        error!("Pipeline failed: {e}");
        std::process::exit(1);
    }

    info!("Classes: {}", pipeline.num_classes().unwrap_or(0));
    if let Some(loaders) = pipeline.loaders() {
        for (partition, loader) in loaders.iter() {
            info!(
                "  {:<5}: {} samples in {} batches",
                partition,
                loader.len(),
                loader.num_batches()
            );
        }
    }
    if let Some(test) = pipeline.loader(Partition::Test) {
        info!("Test loader: {:?}", test);
    }
}
