//! Cache integration tests.
//!
//! Tests verify:
//! - LRU recency order across get/set/expire sequences
//! - Pinned keys survive expiry
//! - Tile cache expiry releases tiles and cancels their loads
//! - Source key changes refresh tiles lazily

use std::collections::HashSet;
use std::sync::Arc;

use tile_supply::collections::LruCache;
use tile_supply::error::CacheError;
use tile_supply::queue::{QueuedTile, TileQueue};
use tile_supply::source::TileSource;
use tile_supply::tile::{TileCoord, TileState};

use super::test_utils::{block, wait_until, GatedLoader, ImmediateLoader};

fn keep(keys: &[&str]) -> HashSet<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

// =============================================================================
// LRU Cache
// =============================================================================

#[test]
fn test_lru_get_refreshes_before_expiry() {
    let mut cache = LruCache::new(2);
    cache.set("a", 1).unwrap();
    cache.set("b", 2).unwrap();
    cache.set("c", 3).unwrap();
    assert_eq!(cache.get("a"), Ok(&1));

    assert!(cache.can_expire_cache());
    assert_eq!(cache.expire_cache(&HashSet::new()), 1);

    assert_eq!(cache.keys(), vec!["c", "a"]);
    assert!(!cache.contains_key("b"));
}

#[test]
fn test_lru_duplicate_set_leaves_cache_unchanged() {
    let mut cache = LruCache::new(4);
    cache.set("a", 1).unwrap();
    cache.set("b", 2).unwrap();

    assert_eq!(
        cache.set("a", 10),
        Err(CacheError::DuplicateKey("a".to_string()))
    );
    assert_eq!(cache.keys(), vec!["a", "b"]);
    assert_eq!(cache.peek("a"), Some(&1));
}

#[test]
fn test_lru_pinned_oldest_blocks_expiry() {
    let mut cache = LruCache::new(1);
    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        cache.set(*key, i).unwrap();
    }

    // Expiry stops at the first pinned entry from the old end
    assert_eq!(cache.expire_cache(&keep(&["a"])), 0);
    assert_eq!(cache.len(), 4);

    cache.get("a").unwrap();
    assert_eq!(cache.expire_cache(&keep(&["a"])), 3);
    assert_eq!(cache.keys(), vec!["a"]);
}

#[test]
fn test_lru_zero_high_water_mark_never_expires() {
    let mut cache = LruCache::new(0);
    for i in 0..100 {
        cache.set(i.to_string(), i).unwrap();
    }

    assert!(!cache.can_expire_cache());
    assert_eq!(cache.expire_cache(&HashSet::new()), 0);
    assert_eq!(cache.len(), 100);
}

#[test]
fn test_lru_missing_key_errors() {
    let mut cache: LruCache<u32> = LruCache::new(4);

    assert_eq!(cache.get("x"), Err(CacheError::NotFound("x".to_string())));
    assert_eq!(cache.remove("x"), Err(CacheError::NotFound("x".to_string())));
    assert_eq!(cache.pop(), Err(CacheError::Empty));
}

// =============================================================================
// Tile Cache Through a Source
// =============================================================================

#[test]
fn test_source_reuses_tiles_across_frames() {
    let loader = ImmediateLoader::new();
    let mut source = TileSource::with_cache_size("osm", Arc::new(loader.clone()), 64);

    let first: Vec<_> = block(2, 3).into_iter().map(|c| source.get_tile(c)).collect();
    let second: Vec<_> = block(2, 3).into_iter().map(|c| source.get_tile(c)).collect();

    assert_eq!(source.tile_count(), 9);
    assert!(first.iter().zip(&second).all(|(a, b)| Arc::ptr_eq(a, b)));
    assert_eq!(loader.request_count(), 0);
}

#[test]
fn test_source_expiry_keeps_wanted_tiles() {
    let mut source = TileSource::with_cache_size("osm", Arc::new(ImmediateLoader::new()), 2);
    for coord in block(3, 2) {
        source.get_tile(coord);
    }

    // "3/0/0" is the oldest but wanted, so nothing is evicted
    assert_eq!(source.expire_cache(&keep(&["3/0/0"])), 0);

    source.use_tile(TileCoord::new(3, 0, 0));
    assert_eq!(source.expire_cache(&keep(&["3/0/0"])), 2);
    assert_eq!(source.cache().keys(), vec!["3/1/1", "3/0/0"]);
}

#[tokio::test]
async fn test_expiry_cancels_in_flight_load() {
    let loader = GatedLoader::new();
    let mut source = TileSource::with_cache_size("osm", Arc::new(loader.clone()), 1);
    let mut queue = TileQueue::new(|_, _, coord, _| f64::from(coord.x), || {});

    let old = source.get_tile(TileCoord::new(4, 0, 0));
    let new = source.get_tile(TileCoord::new(4, 1, 0));
    queue.enqueue(QueuedTile::new(Arc::clone(&old), "osm", 0.0));
    queue.enqueue(QueuedTile::new(Arc::clone(&new), "osm", 0.0));
    assert_eq!(queue.load_more_tiles(4, 4), 2);
    assert_eq!(queue.tiles_loading(), 2);

    // Evicting the loading tile releases it and frees its budget slot
    assert_eq!(source.expire_cache(&HashSet::new()), 1);
    assert_eq!(old.state(), TileState::Aborted);
    assert_eq!(queue.tiles_loading(), 1);
    assert_eq!(old.listener_count(), 0);

    loader.open(1);
    wait_until(|| new.state() == TileState::Loaded).await;
    assert_eq!(queue.tiles_loading(), 0);
    assert_eq!(old.state(), TileState::Aborted);
    assert!(old.data().is_none());
}

#[test]
fn test_source_key_change_refreshes_lazily() {
    let mut source = TileSource::new("osm", Arc::new(ImmediateLoader::new()));
    let coord = TileCoord::new(5, 3, 3);
    let before = source.get_tile(coord);

    source.set_key("osm@v2");
    assert_eq!(source.tile_count(), 1);

    let after = source.get_tile(coord);
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.key(), "osm@v2/5/3/3");
    assert_eq!(after.state(), TileState::Idle);
    assert_eq!(source.tile_count(), 1);
}

#[test]
fn test_prune_except_newest_zoom() {
    let mut source = TileSource::new("osm", Arc::new(ImmediateLoader::new()));
    for coord in block(2, 2) {
        source.get_tile(coord);
    }
    for coord in block(3, 2) {
        source.get_tile(coord);
    }

    assert_eq!(source.cache_mut().prune_except_newest_z(), 4);
    assert_eq!(source.tile_count(), 4);
    assert!(source.cache().keys().iter().all(|k| k.starts_with("3/")));
}
