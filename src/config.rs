//! Configuration management for the tile-supply simulator.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TILE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use tile_supply::config::Config;
//!
//! // Parse from command line and environment
//! let config = Config::parse();
//!
//! println!("Budget: {} in flight, {} new per frame", config.max_total_loading, config.max_new_loads);
//! ```
//!
//! # Environment Variables
//!
//! - `TILE_MAX_TOTAL_LOADING` - Max tiles loading at once (default: 16)
//! - `TILE_MAX_NEW_LOADS` - Max loads started per frame (default: 16)
//! - `TILE_CACHE_SIZE` - Tile cache high water mark (default: 2048)
//! - `TILE_FRAMES` - Number of frames to simulate (default: 120)
//! - `TILE_FRAME_INTERVAL_MS` - Milliseconds between frames (default: 16)
//! - `TILE_VIEWPORT_RADIUS` - Tiles around the centre that are wanted (default: 3, max: 64)
//! - `TILE_ZOOM` - Zoom level of the view (default: 10)
//! - `TILE_PAN_STEP` - Tiles the view pans east per frame (default: 0.25)
//! - `TILE_LOAD_LATENCY_MS` - Simulated load latency (default: 40)
//! - `TILE_FAIL_EVERY` - Fail every Nth load, 0 disables (default: 0)
//! - `TILE_EMPTY_EVERY` - Return no content for every Nth load, 0 disables (default: 0)

use clap::Parser;

use crate::tile::DEFAULT_TILE_CACHE_SIZE;

// =============================================================================
// Default Values
// =============================================================================

/// Default cap on tiles loading at the same time.
pub const DEFAULT_MAX_TOTAL_LOADING: usize = 16;

/// Default cap on loads started by one `load_more_tiles` call.
pub const DEFAULT_MAX_NEW_LOADS: usize = 16;

/// Default number of simulated frames.
pub const DEFAULT_FRAMES: u32 = 120;

/// Default frame interval (about 60 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Default viewport radius in tiles.
pub const DEFAULT_VIEWPORT_RADIUS: u32 = 3;

/// Largest accepted viewport radius in tiles.
pub const MAX_VIEWPORT_RADIUS: u32 = 64;

/// Default zoom level.
pub const DEFAULT_ZOOM: u8 = 10;

/// Highest supported zoom level.
pub const MAX_ZOOM: u8 = 24;

/// Default pan speed in tiles per frame.
pub const DEFAULT_PAN_STEP: f64 = 0.25;

/// Default simulated load latency.
pub const DEFAULT_LOAD_LATENCY_MS: u64 = 40;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tile-supply - Simulate a map renderer's tile load pipeline.
///
/// Pans a viewport across a tile grid, feeding wanted tiles through a
/// throttled load queue and an LRU tile cache, and reports what happened.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-supply")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Queue Configuration
    // =========================================================================
    /// Maximum number of tiles loading at the same time.
    #[arg(long, default_value_t = DEFAULT_MAX_TOTAL_LOADING, env = "TILE_MAX_TOTAL_LOADING")]
    pub max_total_loading: usize,

    /// Maximum number of loads started per frame.
    #[arg(long, default_value_t = DEFAULT_MAX_NEW_LOADS, env = "TILE_MAX_NEW_LOADS")]
    pub max_new_loads: usize,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Number of tiles the cache keeps after each expiry pass (0 disables pruning).
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_SIZE, env = "TILE_CACHE_SIZE")]
    pub cache_size: usize,

    // =========================================================================
    // Viewport Configuration
    // =========================================================================
    /// Number of frames to simulate.
    #[arg(long, default_value_t = DEFAULT_FRAMES, env = "TILE_FRAMES")]
    pub frames: u32,

    /// Milliseconds between frames.
    #[arg(long, default_value_t = DEFAULT_FRAME_INTERVAL_MS, env = "TILE_FRAME_INTERVAL_MS")]
    pub frame_interval_ms: u64,

    /// Tiles around the view centre that are wanted each frame.
    #[arg(long, default_value_t = DEFAULT_VIEWPORT_RADIUS, env = "TILE_VIEWPORT_RADIUS")]
    pub viewport_radius: u32,

    /// Zoom level of the view.
    #[arg(short, long, default_value_t = DEFAULT_ZOOM, env = "TILE_ZOOM")]
    pub zoom: u8,

    /// Tiles the view pans east per frame.
    #[arg(long, default_value_t = DEFAULT_PAN_STEP, env = "TILE_PAN_STEP")]
    pub pan_step: f64,

    // =========================================================================
    // Loader Configuration
    // =========================================================================
    /// Simulated load latency in milliseconds.
    #[arg(long, default_value_t = DEFAULT_LOAD_LATENCY_MS, env = "TILE_LOAD_LATENCY_MS")]
    pub load_latency_ms: u64,

    /// Fail every Nth load (0 never fails).
    #[arg(long, default_value_t = 0, env = "TILE_FAIL_EVERY")]
    pub fail_every: u64,

    /// Return no content for every Nth load (0 never).
    #[arg(long, default_value_t = 0, env = "TILE_EMPTY_EVERY")]
    pub empty_every: u64,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Print the final report as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_total_loading == 0 {
            return Err("max_total_loading must be greater than 0".to_string());
        }
        if self.max_new_loads == 0 {
            return Err("max_new_loads must be greater than 0".to_string());
        }
        if self.frames == 0 {
            return Err("frames must be greater than 0".to_string());
        }
        if self.viewport_radius > MAX_VIEWPORT_RADIUS {
            return Err(format!(
                "viewport_radius must be between 0 and {}",
                MAX_VIEWPORT_RADIUS
            ));
        }
        if self.zoom > MAX_ZOOM {
            return Err(format!("zoom must be between 0 and {}", MAX_ZOOM));
        }
        if !self.pan_step.is_finite() {
            return Err("pan_step must be a finite number".to_string());
        }
        Ok(())
    }

    /// Number of tiles wanted per frame, ignoring grid edges.
    pub fn tiles_per_frame(&self) -> usize {
        let side = (self.viewport_radius as usize)
            .saturating_mul(2)
            .saturating_add(1);
        side.saturating_mul(side)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_total_loading: DEFAULT_MAX_TOTAL_LOADING,
            max_new_loads: DEFAULT_MAX_NEW_LOADS,
            cache_size: DEFAULT_TILE_CACHE_SIZE,
            frames: DEFAULT_FRAMES,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            viewport_radius: DEFAULT_VIEWPORT_RADIUS,
            zoom: DEFAULT_ZOOM,
            pan_step: DEFAULT_PAN_STEP,
            load_latency_ms: DEFAULT_LOAD_LATENCY_MS,
            fail_every: 0,
            empty_every: 0,
            json: false,
            verbose: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
