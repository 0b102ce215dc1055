//! Tile queue integration tests.
//!
//! Tests verify:
//! - The in-flight budget holds across several frames of real loads
//! - Completions free budget and notify the change callback
//! - Failed tiles are retried, empty tiles are final
//! - Frame-based priority orders and drops queued tiles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tile_supply::collections::DROP;
use tile_supply::queue::{tile_priority, FrameState, QueuedTile, TileQueue};
use tile_supply::source::TileSource;
use tile_supply::tile::{TileCoord, TileState};

use super::test_utils::{block, wait_until, GatedLoader, ImmediateLoader};

fn counting_queue() -> (TileQueue, Arc<AtomicUsize>) {
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let queue = TileQueue::new(
        |_, _, coord, _| f64::from(coord.y * 100 + coord.x),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        },
    );
    (queue, changes)
}

// =============================================================================
// Throttling
// =============================================================================

#[tokio::test]
async fn test_budget_holds_until_loads_complete() {
    let loader = GatedLoader::new();
    let mut source = TileSource::new("osm", Arc::new(loader.clone()));
    let (mut queue, changes) = counting_queue();

    let tiles: Vec<_> = block(3, 3).into_iter().map(|c| source.get_tile(c)).collect();
    for tile in &tiles {
        assert!(queue.enqueue(QueuedTile::new(Arc::clone(tile), "osm", 0.0)));
    }

    assert_eq!(queue.load_more_tiles(4, 10), 4);
    assert_eq!(queue.tiles_loading(), 4);
    assert_eq!(queue.len(), 5);

    // Budget is full: nothing new starts
    assert_eq!(queue.load_more_tiles(4, 10), 0);

    loader.open(2);
    wait_until(|| queue.tiles_loading() == 2).await;
    assert_eq!(changes.load(Ordering::SeqCst), 2);

    assert_eq!(queue.load_more_tiles(4, 10), 2);
    assert_eq!(queue.tiles_loading(), 4);
    assert_eq!(queue.len(), 3);

    loader.open(64);
    wait_until(|| queue.tiles_loading() == 0).await;
    assert_eq!(queue.load_more_tiles(4, 10), 3);
    assert!(queue.is_empty());
    wait_until(|| queue.tiles_loading() == 0).await;

    assert!(tiles.iter().all(|t| t.state() == TileState::Loaded));
    assert_eq!(loader.started(), 9);
    assert_eq!(loader.finished(), 9);
    assert_eq!(changes.load(Ordering::SeqCst), 9);
}

#[tokio::test]
async fn test_new_load_cap_per_call() {
    let loader = ImmediateLoader::new();
    let mut source = TileSource::new("osm", Arc::new(loader.clone()));
    let (mut queue, _) = counting_queue();

    for coord in block(2, 2) {
        queue.enqueue(QueuedTile::new(source.get_tile(coord), "osm", 0.0));
    }

    assert_eq!(queue.load_more_tiles(100, 1), 1);
    assert_eq!(queue.load_more_tiles(100, 2), 2);
    assert_eq!(queue.len(), 1);

    wait_until(|| loader.request_count() == 3 && queue.tiles_loading() == 0).await;
}

#[tokio::test]
async fn test_loads_start_in_priority_order() {
    let loader = GatedLoader::new();
    let mut source = TileSource::new("osm", Arc::new(loader));
    let (mut queue, _) = counting_queue();

    let coords = [
        TileCoord::new(4, 3, 1),
        TileCoord::new(4, 0, 0),
        TileCoord::new(4, 2, 0),
        TileCoord::new(4, 1, 1),
    ];
    let tiles: Vec<_> = coords.iter().map(|c| source.get_tile(*c)).collect();
    for tile in &tiles {
        queue.enqueue(QueuedTile::new(Arc::clone(tile), "osm", 0.0));
    }

    queue.load_more_tiles(2, 2);

    // Priorities: 4/3/1 -> 103, 4/0/0 -> 0, 4/2/0 -> 2, 4/1/1 -> 101
    let states: Vec<_> = tiles.iter().map(|t| t.state()).collect();
    assert_eq!(
        states,
        vec![
            TileState::Idle,
            TileState::Loading,
            TileState::Loading,
            TileState::Idle
        ]
    );
}

// =============================================================================
// Outcomes
// =============================================================================

#[tokio::test]
async fn test_failed_tile_is_retried() {
    let loader = GatedLoader::new();
    let coord = TileCoord::new(1, 1, 1);
    loader.fail(coord);
    let mut source = TileSource::new("osm", Arc::new(loader.clone()));
    let (mut queue, _) = counting_queue();

    let tile = source.get_tile(coord);
    queue.enqueue(QueuedTile::new(Arc::clone(&tile), "osm", 0.0));
    queue.load_more_tiles(1, 1);

    loader.open(1);
    wait_until(|| tile.state() == TileState::Error).await;
    assert_eq!(queue.tiles_loading(), 0);
    assert!(tile.data().is_none());

    // Error tiles stay subscribed and can be queued again
    loader.heal(coord);
    assert!(queue.enqueue(QueuedTile::new(Arc::clone(&tile), "osm", 0.0)));
    assert_eq!(queue.load_more_tiles(1, 1), 1);

    loader.open(1);
    wait_until(|| tile.state() == TileState::Loaded).await;
    assert_eq!(tile.data().as_deref(), Some(coord.key().as_bytes()));
    assert_eq!(tile.listener_count(), 0);
    assert_eq!(loader.started(), 2);
}

#[tokio::test]
async fn test_empty_tile_is_final() {
    let loader = GatedLoader::new();
    let coord = TileCoord::new(0, 0, 0);
    loader.empty(coord);
    let mut source = TileSource::new("osm", Arc::new(loader.clone()));
    let (mut queue, changes) = counting_queue();

    let tile = source.get_tile(coord);
    queue.enqueue(QueuedTile::new(Arc::clone(&tile), "osm", 0.0));
    queue.load_more_tiles(1, 1);
    loader.open(1);

    wait_until(|| tile.state() == TileState::Empty).await;
    assert_eq!(changes.load(Ordering::SeqCst), 1);

    // Final tiles are skipped without starting a load
    queue.enqueue(QueuedTile::new(Arc::clone(&tile), "osm", 0.0));
    assert_eq!(queue.load_more_tiles(1, 1), 0);
    assert!(queue.is_empty());
    assert!(!tile.set_state(TileState::Idle));
}

// =============================================================================
// Frame Priority
// =============================================================================

#[tokio::test]
async fn test_frame_priority_drops_unwanted_tiles() {
    let loader = GatedLoader::new();
    let mut source = TileSource::new("osm", Arc::new(loader));
    let frame = Arc::new(RwLock::new(FrameState::new(3, (4.0, 4.0))));

    let mut queue = {
        let frame = Arc::clone(&frame);
        TileQueue::new(
            move |tile, source_key, coord, _| {
                tile_priority(&frame.read().unwrap(), tile, source_key, coord)
            },
            || {},
        )
    };

    let near = source.get_tile(TileCoord::new(3, 4, 4));
    let far = source.get_tile(TileCoord::new(3, 0, 0));
    let unwanted = source.get_tile(TileCoord::new(3, 7, 7));
    {
        let mut frame = frame.write().unwrap();
        frame.want("osm", near.key());
        frame.want("osm", far.key());
    }

    assert!(queue.enqueue(QueuedTile::new(Arc::clone(&far), "osm", 0.0)));
    assert!(queue.enqueue(QueuedTile::new(Arc::clone(&near), "osm", 0.0)));
    assert!(!queue.enqueue(QueuedTile::new(Arc::clone(&unwanted), "osm", 0.0)));
    assert_eq!(queue.len(), 2);

    // The view moves on: "far" is no longer wanted
    {
        let mut next = FrameState::new(3, (4.0, 4.0));
        next.want("osm", near.key());
        *frame.write().unwrap() = next;
    }
    queue.reprioritize();
    assert_eq!(queue.len(), 1);
    assert!(queue.is_key_queued("osm:3/4/4"));

    assert_eq!(queue.load_more_tiles(8, 8), 1);
    assert_eq!(near.state(), TileState::Loading);
    assert_eq!(far.state(), TileState::Idle);
}

#[test]
fn test_drop_priority_is_infinite() {
    assert!(DROP.is_infinite());
    assert!(DROP > 0.0);
}
