//! Frame-based tile prioritisation.
//!
//! The renderer records which tiles it wants for the current frame in a
//! [`FrameState`]; [`tile_priority`] ranks queued tiles against it. Tiles
//! that are no longer wanted get [`DROP`] and fall out of the queue on the
//! next `reprioritize`.

use std::collections::{HashMap, HashSet};

use crate::collections::DROP;
use crate::tile::{Tile, TileCoord};

/// Penalty per zoom level of difference, large enough to dominate distance.
const ZOOM_PENALTY: f64 = 65536.0;

/// What the renderer wants for the frame being drawn.
#[derive(Debug, Clone, Default)]
pub struct FrameState {
    /// Zoom level of the view
    pub zoom: u8,

    /// View centre in tile units at `zoom`
    pub center: (f64, f64),

    /// Wanted tile keys ([`Tile::key`]) per source key
    pub wanted: HashMap<String, HashSet<String>>,
}

impl FrameState {
    pub fn new(zoom: u8, center: (f64, f64)) -> Self {
        Self {
            zoom,
            center,
            wanted: HashMap::new(),
        }
    }

    /// Mark a tile as wanted for this frame.
    pub fn want(&mut self, source_key: &str, tile_key: impl Into<String>) {
        self.wanted
            .entry(source_key.to_string())
            .or_default()
            .insert(tile_key.into());
    }

    pub fn is_wanted(&self, source_key: &str, tile_key: &str) -> bool {
        self.wanted
            .get(source_key)
            .is_some_and(|keys| keys.contains(tile_key))
    }
}

/// Rank a tile for loading: zoom distance first, then distance from the
/// view centre. Unwanted tiles get [`DROP`].
pub fn tile_priority(frame: &FrameState, tile: &Tile, source_key: &str, coord: TileCoord) -> f64 {
    if !frame.is_wanted(source_key, tile.key()) {
        return DROP;
    }

    let zoom_delta = i32::from(frame.zoom) - i32::from(coord.z);
    let scale = 2f64.powi(zoom_delta);
    let (x, y) = coord.center();
    let dx = x * scale - frame.center.0;
    let dy = y * scale - frame.center.1;

    ZOOM_PENALTY * f64::from(zoom_delta.abs()) + (dx * dx + dy * dy).sqrt()
}
