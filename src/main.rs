//! tile-supply - Simulate a map renderer's tile load pipeline.
//!
//! This binary parses the configuration, runs the frame loop and reports
//! what the queue and cache did.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_supply::{simulation, Config, SimulationReport};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("tile-supply v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!(
        "  Budget: {} in flight, {} new per frame",
        config.max_total_loading, config.max_new_loads
    );
    info!("  Cache: {} tiles", config.cache_size);
    info!(
        "  View: zoom {}, radius {} ({} tiles/frame), pan {} tiles/frame",
        config.zoom,
        config.viewport_radius,
        config.tiles_per_frame(),
        config.pan_step
    );
    info!(
        "  Loader: {}ms latency, fail every {}, empty every {}",
        config.load_latency_ms, config.fail_every, config.empty_every
    );
    info!(
        "  Frames: {} at {}ms",
        config.frames, config.frame_interval_ms
    );

    let report = simulation::run(&config).await;

    if config.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_report(&report);
    }

    ExitCode::SUCCESS
}

/// Log the simulation report.
fn print_report(report: &SimulationReport) {
    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Frames:          {}", report.frames);
    info!("  Tiles enqueued:  {}", report.tiles_enqueued);
    info!("  Loads started:   {}", report.loads_started);
    info!("  Peak in flight:  {}", report.peak_loading);
    info!("  Tile changes:    {}", report.tile_changes);
    info!("  Tiles evicted:   {}", report.tiles_evicted);
    info!(
        "  Cache:           {} tiles ({} loaded, {} loading)",
        report.cache_size, report.tiles_loaded, report.tiles_loading
    );
    info!(
        "  Loader:          {} requested, {} loaded, {} failed, {} empty",
        report.loader.requested, report.loader.loaded, report.loader.failed, report.loader.empty
    );
    info!("────────────────────────────────────────────────────────────────");
}

/// Initialize the tracing subscriber for logging.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_supply=debug"
    } else {
        "tile_supply=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
