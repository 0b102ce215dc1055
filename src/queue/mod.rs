//! Tile load scheduling.
//!
//! # Components
//!
//! - [`TileQueue`]: Shared queue the frame loop pumps once per frame with
//!   [`TileQueue::load_more_tiles`]
//! - [`QueuedTile`]: `(tile, source key, coordinate, priority hint)` element
//! - [`FrameState`] / [`tile_priority`]: Default priority function inputs

mod priority;
mod tile_queue;

pub use priority::{tile_priority, FrameState};
pub use tile_queue::{QueuedTile, TileQueue};
