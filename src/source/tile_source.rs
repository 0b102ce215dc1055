//! Tile source: resolves tile coordinates to cached tile objects.
//!
//! The source provides:
//! - LRU caching of tile objects so repeated frames reuse in-flight and
//!   loaded tiles
//! - Revision keys: bumping the key makes every cached tile stale, and
//!   stale tiles are replaced (and released) on their next request
//! - A single loader shared by every tile the source creates
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tile_supply::source::{SimulatedLoader, TileSource};
//! use tile_supply::tile::TileCoord;
//!
//! let mut source = TileSource::new("osm", Arc::new(SimulatedLoader::default()));
//!
//! // Creates and caches an idle tile on first access
//! let tile = source.get_tile(TileCoord::new(3, 4, 2));
//!
//! // Same object on the next frame
//! assert!(Arc::ptr_eq(&tile, &source.get_tile(TileCoord::new(3, 4, 2))));
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::tile::{
    Tile, TileCache, TileCoord, TileLoader, DEFAULT_TILE_CACHE_SIZE, DEFAULT_TRANSITION,
};

/// Owner of one tile cache and the loader for its tiles.
pub struct TileSource {
    /// Name used as the source key in queues and frame state
    name: String,

    /// Revision key embedded in every tile key
    key: String,

    /// Loader shared by all tiles of this source
    loader: Arc<dyn TileLoader>,

    /// Cached tiles keyed by `z/x/y`
    cache: TileCache,

    interpolate: bool,
    transition: Duration,
}

impl TileSource {
    /// Create a new source with the default cache size.
    pub fn new(name: impl Into<String>, loader: Arc<dyn TileLoader>) -> Self {
        Self::with_cache_size(name, loader, DEFAULT_TILE_CACHE_SIZE)
    }

    /// Create a new source with a custom cache high water mark.
    ///
    /// # Arguments
    /// * `name` - Source key, also the initial revision key
    /// * `loader` - Loader used by every tile of this source
    /// * `cache_size` - Number of tiles kept after an expiry pass
    pub fn with_cache_size(
        name: impl Into<String>,
        loader: Arc<dyn TileLoader>,
        cache_size: usize,
    ) -> Self {
        let name = name.into();
        Self {
            key: name.clone(),
            name,
            loader,
            cache: TileCache::with_high_water_mark(cache_size),
            interpolate: true,
            transition: DEFAULT_TRANSITION,
        }
    }

    /// Set the interpolation flag of tiles created from now on.
    pub fn with_interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    /// Set the opacity transition of tiles created from now on.
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current revision key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Change the revision key. Cached tiles are refreshed lazily by
    /// [`get_tile`](Self::get_tile).
    pub fn set_key(&mut self, key: impl Into<String>) {
        let key = key.into();
        if key != self.key {
            debug!(source = %self.name, from = %self.key, to = %key, "Source key changed");
            self.key = key;
        }
    }

    /// Return the tile for `coord`, creating and caching it on first access.
    ///
    /// A cached tile from an older revision is replaced by a fresh idle tile
    /// and released.
    pub fn get_tile(&mut self, coord: TileCoord) -> Arc<Tile> {
        let cache_key = coord.key();
        let tile_key = format!("{}/{}", self.key, cache_key);

        match self.cache.get(&cache_key).ok().cloned() {
            Some(tile) if tile.key() == tile_key => tile,
            Some(stale) => {
                let tile = self.create_tile(coord);
                if self.cache.replace(&cache_key, Arc::clone(&tile)).is_ok() {
                    debug!(tile = %stale.key(), state = %stale.state(), "Replacing stale tile");
                    stale.release();
                }
                tile
            }
            None => {
                let tile = self.create_tile(coord);
                if let Err(e) = self.cache.set(cache_key, Arc::clone(&tile)) {
                    warn!(error = %e, "Failed to cache tile");
                }
                tile
            }
        }
    }

    /// Mark a cached tile as recently used. Returns `false` if it is not cached.
    pub fn use_tile(&mut self, coord: TileCoord) -> bool {
        self.cache.get(&coord.key()).is_ok()
    }

    /// Evict tiles beyond the cache size, keeping the coordinate keys in `keep`.
    pub fn expire_cache(&mut self, keep: &HashSet<String>) -> usize {
        self.cache.expire_cache(keep)
    }

    /// Release and drop every cached tile.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Number of cached tiles.
    pub fn tile_count(&self) -> usize {
        self.cache.len()
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TileCache {
        &mut self.cache
    }

    fn create_tile(&self, coord: TileCoord) -> Arc<Tile> {
        Arc::new(
            Tile::new(coord, Arc::clone(&self.loader))
                .with_source_key(&self.key)
                .with_interpolate(self.interpolate)
                .with_transition(self.transition),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
