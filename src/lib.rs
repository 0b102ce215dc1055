//! # tile-supply
//!
//! Tile supply pipeline for tiled map renderers.
//!
//! This library keeps track of which map tiles exist, which are loading and
//! which should load next. A renderer asks a source for the tiles it wants
//! each frame, queues the ones that are not loaded yet, and lets the queue
//! start loads under an in-flight budget while an LRU cache bounds the number
//! of live tile objects.
//!
//! ## Features
//!
//! - **LRU cache**: Keyed, recency ordered cache with a soft high water mark
//!   and pinned keys that survive expiry
//! - **Priority queue**: Binary min-heap with key deduplication, reprioritization
//!   and a `DROP` sentinel that removes unwanted elements
//! - **Tile lifecycle**: `Idle → Loading → Loaded / Error / Empty` state machine
//!   with change listeners and cancellable loads
//! - **Throttled loading**: A tile queue that caps total in-flight and newly
//!   started loads per call
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`collections`] - Generic LRU cache and priority queue
//! - [`tile`] - Tile coordinates, states, lifecycle and the tile cache
//! - [`queue`] - Tile load queue and frame-based priority
//! - [`source`] - Tile sources and the simulated loader
//! - [`simulation`] - Frame loop driving a source and a queue
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_supply::{SimulatedLoader, TileCoord, TileQueue, TileSource, QueuedTile};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut source = TileSource::new("osm", Arc::new(SimulatedLoader::default()));
//!     let mut queue = TileQueue::new(|_, _, coord, _| f64::from(coord.z), || {});
//!
//!     let tile = source.get_tile(TileCoord::new(3, 4, 2));
//!     queue.enqueue(QueuedTile::new(tile, source.name(), 0.0));
//!
//!     // Start at most 8 loads in flight, 4 of them new
//!     queue.load_more_tiles(8, 4);
//! }
//! ```

pub mod collections;
pub mod config;
pub mod error;
pub mod queue;
pub mod simulation;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use collections::{LruCache, PriorityQueue, DEFAULT_HIGH_WATER_MARK, DROP};
pub use config::Config;
pub use error::{CacheError, CoordError, LoadError, QueueError};
pub use queue::{tile_priority, FrameState, QueuedTile, TileQueue};
pub use simulation::{run, wanted_tiles, SimulationReport};
pub use source::{LoaderSnapshot, LoaderStats, SimulatedLoader, TileSource};
pub use tile::{
    ListenerId, Tile, TileCache, TileCoord, TileListener, TileLoader, TileState,
    DEFAULT_TILE_CACHE_SIZE, DEFAULT_TRANSITION,
};
