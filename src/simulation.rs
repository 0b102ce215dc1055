//! Frame loop simulation.
//!
//! Drives one [`TileSource`] and a shared [`TileQueue`] the way a map
//! renderer does, once per frame:
//!
//! 1. Compute the wanted tile coordinates around the view centre
//! 2. Resolve each coordinate to a tile through the source
//! 3. Publish the frame state read by the queue's priority function
//! 4. Enqueue wanted tiles that are `Idle` or `Error`
//! 5. `reprioritize`, then `load_more_tiles` under the configured budgets
//! 6. Expire the source cache, keeping the wanted tiles
//!
//! Loads run on the ambient tokio runtime through a [`SimulatedLoader`].

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::Config;
use crate::queue::{tile_priority, FrameState, QueuedTile, TileQueue};
use crate::source::{LoaderSnapshot, SimulatedLoader, TileSource};
use crate::tile::{TileCoord, TileState};

/// Source key used by the simulated source.
pub const SOURCE_NAME: &str = "simulated";

/// Frames between progress log lines.
const LOG_EVERY: u32 = 30;

/// Outcome of a simulation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulationReport {
    /// Frames simulated
    pub frames: u32,

    /// Successful `enqueue` calls
    pub tiles_enqueued: u64,

    /// Loads started by `load_more_tiles`
    pub loads_started: u64,

    /// Highest in-flight count observed right after `load_more_tiles`
    pub peak_loading: usize,

    /// Tile change callbacks received by the queue
    pub tile_changes: u64,

    /// Tiles evicted by cache expiry
    pub tiles_evicted: u64,

    /// Tiles cached at the end of the run
    pub cache_size: usize,

    /// Cached tiles in `Loaded` state at the end of the run
    pub tiles_loaded: usize,

    /// Tiles still loading at the end of the run
    pub tiles_loading: usize,

    /// Loader counters
    pub loader: LoaderSnapshot,
}

/// Coordinates within `radius` tiles of `center`, clipped to the grid at `zoom`.
///
/// Returned row by row, so callers that need an order should sort.
pub fn wanted_tiles(zoom: u8, center: (f64, f64), radius: u32) -> Vec<TileCoord> {
    let grid = 1i64 << zoom;
    let radius = i64::from(radius);
    let cx = center.0.floor() as i64;
    let cy = center.1.floor() as i64;

    let (x_min, x_max) = ((cx - radius).max(0), (cx + radius).min(grid - 1));
    let (y_min, y_max) = ((cy - radius).max(0), (cy + radius).min(grid - 1));

    let mut coords = Vec::new();
    for y in y_min..=y_max {
        for x in x_min..=x_max {
            coords.push(TileCoord::new(zoom, x as i32, y as i32));
        }
    }
    coords
}

/// Run the frame loop described by `config`.
///
/// Must be called from within a tokio runtime.
pub async fn run(config: &Config) -> SimulationReport {
    let loader = SimulatedLoader::new(Duration::from_millis(config.load_latency_ms))
        .with_fail_every(config.fail_every)
        .with_empty_every(config.empty_every);
    let loader_stats = loader.stats();
    let mut source = TileSource::with_cache_size(SOURCE_NAME, Arc::new(loader), config.cache_size);

    let frame_state = Arc::new(RwLock::new(FrameState::default()));
    let tile_changes = Arc::new(AtomicU64::new(0));

    let mut queue = {
        let frame_state = Arc::clone(&frame_state);
        let tile_changes = Arc::clone(&tile_changes);
        TileQueue::new(
            move |tile, source_key, coord, _hint| {
                let frame = frame_state.read().unwrap_or_else(PoisonError::into_inner);
                tile_priority(&frame, tile, source_key, coord)
            },
            move || {
                tile_changes.fetch_add(1, Ordering::Relaxed);
            },
        )
    };

    let mut interval = tokio::time::interval(Duration::from_millis(config.frame_interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let grid_center = f64::from(1u32 << config.zoom.min(31)) / 2.0;
    let mut center = (grid_center, grid_center);
    let mut report = SimulationReport::default();

    for frame in 0..config.frames {
        interval.tick().await;

        let coords = wanted_tiles(config.zoom, center, config.viewport_radius);
        let mut state = FrameState::new(config.zoom, center);
        let mut keep = HashSet::with_capacity(coords.len());
        let mut tiles = Vec::with_capacity(coords.len());

        for coord in &coords {
            let tile = source.get_tile(*coord);
            state.want(source.name(), tile.key());
            keep.insert(coord.key());
            tiles.push(tile);
        }
        *frame_state.write().unwrap_or_else(PoisonError::into_inner) = state;

        for tile in tiles {
            if tile.state().is_loadable() && queue.enqueue(QueuedTile::new(tile, SOURCE_NAME, 0.0)) {
                report.tiles_enqueued += 1;
            }
        }

        queue.reprioritize();
        let started = queue.load_more_tiles(config.max_total_loading, config.max_new_loads);
        report.loads_started += started as u64;
        report.peak_loading = report.peak_loading.max(queue.tiles_loading());

        let evicted = source.expire_cache(&keep);
        report.tiles_evicted += evicted as u64;

        debug!(
            frame,
            wanted = coords.len(),
            started,
            loading = queue.tiles_loading(),
            queued = queue.len(),
            evicted,
            "Frame complete"
        );
        if (frame + 1) % LOG_EVERY == 0 {
            info!(
                frame = frame + 1,
                loading = queue.tiles_loading(),
                queued = queue.len(),
                cached = source.tile_count(),
                "Simulation progress"
            );
        }

        center.0 += config.pan_step;
        report.frames += 1;
    }

    report.cache_size = source.tile_count();
    report.tiles_loaded = source
        .cache()
        .tiles()
        .iter()
        .filter(|tile| tile.state() == TileState::Loaded)
        .count();
    report.tiles_loading = queue.tiles_loading();
    report.tile_changes = tile_changes.load(Ordering::Relaxed);
    report.loader = loader_stats.snapshot();
    report
}
