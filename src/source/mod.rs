//! Tile sources.
//!
//! A source resolves tile coordinates to tile objects and owns the cache
//! those objects live in.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Frame loop                 │
//! └──────────┬──────────────────┬───────────┘
//!            │ get_tile         │ enqueue / load_more_tiles
//!            ▼                  ▼
//! ┌──────────────────┐  ┌──────────────────┐
//! │   TileSource     │  │    TileQueue     │
//! │  (TileCache)     │  │                  │
//! └────────┬─────────┘  └────────┬─────────┘
//!          │                     │ tile.load()
//!          ▼                     ▼
//! ┌─────────────────────────────────────────┐
//! │        TileLoader (e.g. simulated)      │
//! └─────────────────────────────────────────┘
//! ```

mod simulated;
mod tile_source;

pub use simulated::{LoaderSnapshot, LoaderStats, SimulatedLoader, DEFAULT_LATENCY};
pub use tile_source::TileSource;
