//! Throttled tile load queue.
//!
//! The frame loop enqueues candidate tiles every frame and then calls
//! [`TileQueue::load_more_tiles`] once. The queue starts loads in priority
//! order under two budgets: a global cap on tiles in flight and a per-call
//! cap on newly started loads, so a large backlog cannot start an unbounded
//! burst in a single frame.
//!
//! In-flight tracking is driven by tile state notifications. The queue
//! subscribes to a tile the first time it is enqueued; whenever a tracked
//! tile leaves `Loading` the in-flight count drops and the change callback
//! fires so the renderer can schedule a repaint. Tiles that reach a final
//! state, or are neither queued nor loading after `load_more_tiles`,
//! `reprioritize` or `clear`, are unsubscribed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::debug;

use crate::collections::PriorityQueue;
use crate::tile::{ListenerId, Tile, TileCoord, TileState};

// =============================================================================
// Queue Element
// =============================================================================

/// A tile waiting in a [`TileQueue`].
#[derive(Debug, Clone)]
pub struct QueuedTile {
    /// The tile to load
    pub tile: Arc<Tile>,

    /// Key of the source the tile belongs to
    pub source_key: String,

    /// Grid position of the tile
    pub tile_coord: TileCoord,

    /// Priority hint handed to the priority function
    pub priority: f64,
}

impl QueuedTile {
    pub fn new(tile: Arc<Tile>, source_key: impl Into<String>, priority: f64) -> Self {
        let tile_coord = tile.tile_coord();
        Self {
            tile,
            source_key: source_key.into(),
            tile_coord,
            priority,
        }
    }

    /// De-duplication key: `<source key>:z/x/y`.
    pub fn queue_key(&self) -> String {
        format!("{}:{}", self.source_key, self.tile_coord)
    }
}

// =============================================================================
// Load Tracking
// =============================================================================

/// In-flight bookkeeping shared between the queue and tile listeners.
struct LoadTracker {
    /// Ids of tiles this queue started that are still loading
    loading: Mutex<HashSet<u64>>,

    /// Tiles the queue listens to, by tile id
    subscriptions: Mutex<HashMap<u64, (Weak<Tile>, ListenerId)>>,

    tile_change_callback: Box<dyn Fn() + Send + Sync>,
}

impl LoadTracker {
    fn handle_tile_change(&self, tile: &Tile) {
        let state = tile.state();
        if state == TileState::Loading {
            return;
        }

        if state.is_final() {
            let subscription = self.lock_subscriptions().remove(&tile.id());
            if let Some((_, listener)) = subscription {
                tile.remove_listener(listener);
            }
        }

        if self.lock_loading().remove(&tile.id()) {
            debug!(tile = %tile.key(), state = %state, "Tile finished loading");
        }

        (self.tile_change_callback)();
    }

    fn lock_loading(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.loading.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscriptions(&self) -> MutexGuard<'_, HashMap<u64, (Weak<Tile>, ListenerId)>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tile Queue
// =============================================================================

/// Priority queue of tiles with in-flight load throttling.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use tile_supply::error::LoadError;
/// use tile_supply::queue::{QueuedTile, TileQueue};
/// use tile_supply::tile::{Tile, TileCoord, TileLoader};
///
/// struct Slow;
///
/// #[async_trait]
/// impl TileLoader for Slow {
///     async fn load(&self, _coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
///         std::future::pending().await
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut queue = TileQueue::new(|_tile, _source, coord, _hint| coord.x as f64, || {});
///     for x in 0..5 {
///         let tile = Arc::new(Tile::new(TileCoord::new(3, x, 0), Arc::new(Slow)));
///         queue.enqueue(QueuedTile::new(tile, "osm", 0.0));
///     }
///
///     assert_eq!(queue.load_more_tiles(2, 5), 2);
///     assert_eq!(queue.tiles_loading(), 2);
///     assert_eq!(queue.len(), 3);
/// }
/// ```
pub struct TileQueue {
    queue: PriorityQueue<QueuedTile>,
    tracker: Arc<LoadTracker>,
}

impl TileQueue {
    /// Create an empty queue.
    ///
    /// # Arguments
    /// * `priority_function` - Ranks `(tile, source key, coord, hint)`; lower loads first,
    ///   [`DROP`](crate::collections::DROP) removes the tile
    /// * `tile_change_callback` - Called whenever a tracked tile leaves `Loading`
    pub fn new<P, C>(priority_function: P, tile_change_callback: C) -> Self
    where
        P: Fn(&Tile, &str, TileCoord, f64) -> f64 + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        let queue = PriorityQueue::new(
            move |element: &QueuedTile| {
                priority_function(
                    &element.tile,
                    &element.source_key,
                    element.tile_coord,
                    element.priority,
                )
            },
            QueuedTile::queue_key,
        );

        Self {
            queue,
            tracker: Arc::new(LoadTracker {
                loading: Mutex::new(HashSet::new()),
                subscriptions: Mutex::new(HashMap::new()),
                tile_change_callback: Box::new(tile_change_callback),
            }),
        }
    }

    /// Queue a tile.
    ///
    /// Returns `false` if the same source/coordinate pair is already queued
    /// or the priority function drops it. The queue subscribes to the tile's
    /// state changes on its first successful insert.
    pub fn enqueue(&mut self, element: QueuedTile) -> bool {
        let tile = Arc::clone(&element.tile);
        if !self.queue.enqueue(element) {
            return false;
        }
        self.subscribe(&tile);
        true
    }

    /// Start loading queued tiles in priority order.
    ///
    /// Stops once `max_total_loading` tiles are in flight, `max_new_loads`
    /// loads were started by this call, or the queue is empty. Dequeued
    /// tiles that are no longer `Idle` or `Error` are discarded.
    ///
    /// Returns the number of loads started.
    pub fn load_more_tiles(&mut self, max_total_loading: usize, max_new_loads: usize) -> usize {
        let mut new_loads = 0;

        while self.tiles_loading() < max_total_loading && new_loads < max_new_loads {
            let Ok(element) = self.queue.dequeue() else {
                break;
            };
            let tile = element.tile;

            if !tile.state().is_loadable() {
                debug!(tile = %tile.key(), state = %tile.state(), "Skipping tile");
                continue;
            }
            if !self.tracker.lock_loading().insert(tile.id()) {
                continue;
            }

            // Subscribed before load() so a synchronous transition is observed.
            self.subscribe(&tile);
            new_loads += 1;
            tile.load();
        }

        self.prune_subscriptions();

        if new_loads > 0 {
            debug!(
                started = new_loads,
                loading = self.tiles_loading(),
                queued = self.queue.len(),
                "Started tile loads"
            );
        }
        new_loads
    }

    /// Number of tiles started by this queue that are still loading.
    pub fn tiles_loading(&self) -> usize {
        self.tracker.lock_loading().len()
    }

    /// React to a state change of a tracked tile.
    ///
    /// Tile listeners registered by [`enqueue`](Self::enqueue) call this
    /// automatically.
    pub fn handle_tile_change(&self, tile: &Tile) {
        self.tracker.handle_tile_change(tile);
    }

    /// Recompute priorities, dropping tiles that are no longer wanted.
    pub fn reprioritize(&mut self) {
        self.queue.reprioritize();
        self.prune_subscriptions();
    }

    /// Drop every queued tile. Loads already in flight stay tracked.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.prune_subscriptions();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued tiles.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, element: &QueuedTile) -> bool {
        self.queue.is_queued(element)
    }

    pub fn is_key_queued(&self, key: &str) -> bool {
        self.queue.is_key_queued(key)
    }

    fn subscribe(&self, tile: &Arc<Tile>) {
        let mut subscriptions = self.tracker.lock_subscriptions();
        if subscriptions.contains_key(&tile.id()) || tile.state().is_final() {
            return;
        }

        let tracker = Arc::downgrade(&self.tracker);
        let listener = tile.add_listener(move |tile| {
            if let Some(tracker) = tracker.upgrade() {
                tracker.handle_tile_change(tile);
            }
        });
        subscriptions.insert(tile.id(), (Arc::downgrade(tile), listener));
    }

    /// Unsubscribe from tiles that are neither queued nor loading, and forget
    /// tiles that no longer exist.
    fn prune_subscriptions(&self) {
        let queued: HashSet<u64> = self.queue.iter().map(|element| element.tile.id()).collect();
        let loading = self.tracker.lock_loading().clone();

        let stale: Vec<(Weak<Tile>, ListenerId)> = {
            let mut subscriptions = self.tracker.lock_subscriptions();
            let ids: Vec<u64> = subscriptions
                .keys()
                .filter(|id| !queued.contains(id) && !loading.contains(id))
                .copied()
                .collect();
            ids.iter()
                .filter_map(|id| subscriptions.remove(id))
                .collect()
        };

        if !stale.is_empty() {
            debug!(count = stale.len(), "Dropped idle tile subscriptions");
        }
        for (tile, listener) in stale {
            if let Some(tile) = tile.upgrade() {
                tile.remove_listener(listener);
            }
        }
    }

    #[cfg(test)]
    fn subscription_count(&self) -> usize {
        self.tracker.lock_subscriptions().len()
    }
}

impl Drop for TileQueue {
    fn drop(&mut self) {
        let subscriptions = std::mem::take(&mut *self.tracker.lock_subscriptions());
        for (tile, listener) in subscriptions.into_values() {
            if let Some(tile) = tile.upgrade() {
                tile.remove_listener(listener);
            }
        }
    }
}

impl fmt::Debug for TileQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileQueue")
            .field("queued", &self.queue.len())
            .field("loading", &self.tiles_loading())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
