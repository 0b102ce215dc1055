//! Simulation integration tests.
//!
//! Tests verify:
//! - The frame loop respects the in-flight budget
//! - A still view loads every wanted tile
//! - Panning evicts tiles while the cache stays bounded
//! - Failed loads are retried and empty tiles are not
//! - The report serializes to JSON

use tile_supply::config::Config;
use tile_supply::simulation::{self, SimulationReport};

fn fast_config() -> Config {
    Config {
        max_total_loading: 8,
        max_new_loads: 4,
        cache_size: 30,
        frames: 100,
        frame_interval_ms: 2,
        viewport_radius: 2,
        zoom: 6,
        pan_step: 0.0,
        load_latency_ms: 1,
        ..Config::default()
    }
}

fn assert_consistent(config: &Config, report: &SimulationReport) {
    assert_eq!(report.frames, config.frames);
    assert!(report.peak_loading <= config.max_total_loading);
    assert!(report.cache_size <= config.cache_size.max(config.tiles_per_frame()));
    assert!(report.loader.requested <= report.loads_started);
    assert!(
        report.loader.loaded + report.loader.failed + report.loader.empty
            <= report.loader.requested
    );
}

#[tokio::test]
async fn test_still_view_loads_every_wanted_tile() {
    let config = fast_config();
    let report = simulation::run(&config).await;

    assert_consistent(&config, &report);
    assert_eq!(report.tiles_enqueued, 25);
    assert_eq!(report.loads_started, 25);
    assert_eq!(report.tiles_loaded, 25);
    assert_eq!(report.tiles_loading, 0);
    assert_eq!(report.tiles_evicted, 0);
    assert_eq!(report.cache_size, 25);
    assert_eq!(report.tile_changes, 25);
}

#[tokio::test]
async fn test_panning_evicts_and_stays_bounded() {
    let config = Config {
        pan_step: 1.0,
        frames: 40,
        ..fast_config()
    };
    let report = simulation::run(&config).await;

    assert_consistent(&config, &report);
    assert!(report.tiles_evicted > 0);
    assert!(report.tiles_enqueued > 25);
}

#[tokio::test]
async fn test_failed_loads_are_retried() {
    let config = Config {
        fail_every: 3,
        ..fast_config()
    };
    let report = simulation::run(&config).await;

    assert_consistent(&config, &report);
    assert!(report.loader.failed > 0);
    assert!(report.loads_started > 25);
}

#[tokio::test]
async fn test_empty_tiles_are_not_retried() {
    let config = Config {
        empty_every: 5,
        ..fast_config()
    };
    let report = simulation::run(&config).await;

    assert_consistent(&config, &report);
    assert_eq!(report.loads_started, 25);
    assert_eq!(report.loader.empty, 5);
    assert_eq!(report.tiles_loaded, 20);
}

#[tokio::test]
async fn test_report_serializes() {
    let config = Config {
        frames: 3,
        ..fast_config()
    };
    let report = simulation::run(&config).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["frames"], 3);
    assert!(json["loader"]["requested"].is_u64());
    assert!(json["peak_loading"].as_u64().unwrap() <= 8);
}
