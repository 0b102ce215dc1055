//! Per-source cache of tile objects.
//!
//! This module wraps [`LruCache`] with tile-aware eviction: every tile that
//! leaves the cache through an expiry or prune pass is released, which frees
//! its data and cancels an in-flight load.
//!
//! # Cache Key
//!
//! Tiles are cached by their coordinate key, `z/x/y`. The source revision is
//! part of [`Tile::key`], not of the cache key, so a stale tile can be
//! replaced in place when the source changes.
//!
//! # Eviction
//!
//! Inserting never evicts. [`TileCache::expire_cache`] prunes oldest tiles
//! down to the high water mark and stops at the first tile that is still
//! wanted.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::collections::{LruCache, DEFAULT_HIGH_WATER_MARK};
use crate::error::CacheError;

use super::lifecycle::Tile;

/// Default number of tiles a source keeps after an expiry pass.
pub const DEFAULT_TILE_CACHE_SIZE: usize = DEFAULT_HIGH_WATER_MARK;

/// LRU cache of tiles keyed by `z/x/y`.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use tile_supply::error::LoadError;
/// use tile_supply::tile::{Tile, TileCache, TileCoord, TileLoader};
///
/// struct Blank;
///
/// #[async_trait]
/// impl TileLoader for Blank {
///     async fn load(&self, _coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
///         Ok(None)
///     }
/// }
///
/// let mut cache = TileCache::with_high_water_mark(1);
/// for x in 0..3 {
///     let coord = TileCoord::new(4, x, 0);
///     cache.set(coord.key(), Arc::new(Tile::new(coord, Arc::new(Blank)))).unwrap();
/// }
///
/// let wanted: HashSet<String> = ["4/1/0".to_string()].into();
/// assert_eq!(cache.expire_cache(&wanted), 1);
/// assert_eq!(cache.len(), 2);
/// ```
pub struct TileCache {
    /// The underlying LRU cache
    cache: LruCache<Arc<Tile>>,
}

impl TileCache {
    /// Create a new tile cache with the default high water mark.
    pub fn new() -> Self {
        Self::with_high_water_mark(DEFAULT_TILE_CACHE_SIZE)
    }

    /// Create a new tile cache.
    ///
    /// # Arguments
    ///
    /// * `high_water_mark` - Number of tiles kept after an expiry pass (`0` keeps everything)
    pub fn with_high_water_mark(high_water_mark: usize) -> Self {
        Self {
            cache: LruCache::new(high_water_mark),
        }
    }

    /// Get a tile and mark it as recently used.
    pub fn get(&mut self, key: &str) -> Result<&Arc<Tile>, CacheError> {
        self.cache.get(key)
    }

    /// Get a tile without updating LRU order.
    pub fn peek(&self, key: &str) -> Option<&Arc<Tile>> {
        self.cache.peek(key)
    }

    /// Check if a tile is cached without updating LRU order.
    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Cache a new tile.
    pub fn set(&mut self, key: impl Into<String>, tile: Arc<Tile>) -> Result<(), CacheError> {
        self.cache.set(key, tile)
    }

    /// Swap the tile cached under `key`, returning the previous one.
    ///
    /// The previous tile is not released; that is up to the caller.
    pub fn replace(&mut self, key: &str, tile: Arc<Tile>) -> Result<Arc<Tile>, CacheError> {
        let slot = self.cache.get_mut(key)?;
        Ok(std::mem::replace(slot, tile))
    }

    /// Remove a tile from the cache without releasing it.
    pub fn remove(&mut self, key: &str) -> Result<Arc<Tile>, CacheError> {
        self.cache.remove(key)
    }

    /// Release and evict the oldest tiles until the cache is back at its
    /// high water mark, stopping at the first tile whose key is in `keep`.
    ///
    /// Returns the number of evicted tiles.
    pub fn expire_cache(&mut self, keep: &HashSet<String>) -> usize {
        let evicted = self.cache.expire_cache_with(keep, |key, tile| {
            debug!(key = %key, state = %tile.state(), "Evicting tile");
            tile.release();
        });
        if evicted > 0 {
            debug!(evicted, remaining = self.cache.len(), "Expired tile cache");
        }
        evicted
    }

    /// Whether an expiry pass would evict anything if nothing were kept.
    pub fn can_expire_cache(&self) -> bool {
        self.cache.can_expire_cache()
    }

    /// Release and remove every tile whose zoom differs from the newest tile's.
    ///
    /// Returns the number of removed tiles.
    pub fn prune_except_newest_z(&mut self) -> usize {
        let Some(z) = self
            .cache
            .peek_first_key()
            .and_then(|key| self.cache.peek(key))
            .map(|tile| tile.tile_coord().z)
        else {
            return 0;
        };

        let stale: Vec<String> = self
            .cache
            .iter()
            .filter(|(_, tile)| tile.tile_coord().z != z)
            .map(|(key, _)| key.to_string())
            .collect();

        for key in &stale {
            if let Ok(tile) = self.cache.remove(key) {
                tile.release();
            }
        }
        stale.len()
    }

    /// Release and remove every tile.
    pub fn clear(&mut self) {
        self.cache.for_each(|tile, _| tile.release());
        self.cache.clear();
    }

    /// Change the high water mark. Takes effect on the next expiry pass.
    pub fn set_size(&mut self, size: usize) {
        self.cache.set_size(size);
    }

    /// Get the current number of cached tiles.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Get the high water mark.
    pub fn high_water_mark(&self) -> usize {
        self.cache.high_water_mark()
    }

    /// Cache keys from oldest to newest.
    pub fn keys(&self) -> Vec<&str> {
        self.cache.keys()
    }

    /// Cached tiles from oldest to newest.
    pub fn tiles(&self) -> Vec<&Arc<Tile>> {
        self.cache.values()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
