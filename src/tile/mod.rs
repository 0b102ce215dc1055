//! Tile layer.
//!
//! This module provides the tile object, its load state machine and the
//! per-source tile cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              TileSource                 │
//! │   (resolves coordinates to tiles)       │
//! └────────────────────┬────────────────────┘
//!                      │ owns
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileCache                  │
//! │   (LRU of Arc<Tile>, releases on evict) │
//! └────────────────────┬────────────────────┘
//!                      │ holds
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                 Tile                    │
//! │  state machine ──▶ change listeners     │
//! │  load() ──▶ TileLoader (tokio task)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Tile`]: One coordinate's load lifecycle and loaded data
//! - [`TileState`]: `Idle`, `Loading`, `Loaded`, `Error`, `Empty`, `Aborted`
//! - [`TileCoord`]: `(z, x, y)` grid position, keyed as `z/x/y`
//! - [`TileLoader`]: Async trait that performs the actual fetch/decode
//! - [`TileCache`]: LRU cache of tiles with keep-set aware expiry

mod cache;
mod coord;
mod lifecycle;
mod state;

pub use cache::{TileCache, DEFAULT_TILE_CACHE_SIZE};
pub use coord::TileCoord;
pub use lifecycle::{ListenerId, Tile, TileListener, TileLoader, DEFAULT_TRANSITION};
pub use state::TileState;
