//! Tile objects and their load lifecycle.
//!
//! A [`Tile`] is shared (`Arc<Tile>`) between the source cache that owns it
//! and the queue that schedules it. All state lives behind interior locks so
//! a load task running on the tokio runtime can complete the tile while the
//! frame loop holds other references.
//!
//! Every state transition is broadcast to the tile's listeners after the
//! state lock is released, so a listener may call back into the tile.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::LoadError;

use super::coord::TileCoord;
use super::state::TileState;

/// Default duration of the opacity fade-in once a tile is first drawn.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(250);

/// Offset applied to transition progress so the first frame is not fully transparent.
const FRAME_OFFSET: Duration = Duration::from_micros(16_667);

static NEXT_TILE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Loader
// =============================================================================

/// Fetches and decodes the content of a tile.
///
/// This is the only place I/O happens. The returned value decides the
/// tile's next state:
///
/// - `Ok(Some(data))` -> [`TileState::Loaded`]
/// - `Ok(None)` -> [`TileState::Empty`]
/// - `Err(_)` -> [`TileState::Error`]
#[async_trait]
pub trait TileLoader: Send + Sync {
    async fn load(&self, coord: TileCoord) -> Result<Option<Bytes>, LoadError>;
}

// =============================================================================
// Listeners
// =============================================================================

/// Callback invoked after every state transition of a tile.
pub type TileListener = Arc<dyn Fn(&Tile) + Send + Sync>;

/// Handle returned by [`Tile::add_listener`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

// =============================================================================
// Tile
// =============================================================================

struct TileInner {
    state: TileState,
    data: Option<Bytes>,
    task: Option<AbortHandle>,
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Started(Instant),
    Ended,
}

/// One tile coordinate and its load lifecycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use bytes::Bytes;
/// use tile_supply::error::LoadError;
/// use tile_supply::tile::{Tile, TileCoord, TileLoader, TileState};
///
/// struct Static;
///
/// #[async_trait]
/// impl TileLoader for Static {
///     async fn load(&self, _coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
///         Ok(Some(Bytes::from_static(b"png")))
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let tile = Arc::new(Tile::new(TileCoord::new(0, 0, 0), Arc::new(Static)));
///     tile.load();
///     assert_eq!(tile.state(), TileState::Loading);
///
///     while tile.state() == TileState::Loading {
///         tokio::task::yield_now().await;
///     }
///     assert_eq!(tile.state(), TileState::Loaded);
/// }
/// ```
pub struct Tile {
    id: u64,
    tile_coord: TileCoord,
    key: String,
    interpolate: bool,
    transition: Duration,
    loader: Arc<dyn TileLoader>,
    inner: Mutex<TileInner>,
    listeners: Mutex<Vec<(ListenerId, TileListener)>>,
    next_listener_id: AtomicU64,
    transition_starts: Mutex<HashMap<u64, Transition>>,
}

impl Tile {
    /// Create an idle tile.
    ///
    /// # Arguments
    /// * `tile_coord` - Grid position of the tile
    /// * `loader` - Fetches the tile content when [`load`](Self::load) is called
    pub fn new(tile_coord: TileCoord, loader: Arc<dyn TileLoader>) -> Self {
        Self {
            id: NEXT_TILE_ID.fetch_add(1, Ordering::Relaxed),
            tile_coord,
            key: tile_coord.key(),
            interpolate: true,
            transition: DEFAULT_TRANSITION,
            loader,
            inner: Mutex::new(TileInner {
                state: TileState::Idle,
                data: None,
                task: None,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            transition_starts: Mutex::new(HashMap::new()),
        }
    }

    /// Prefix the tile key with the revision key of the owning source.
    pub fn with_source_key(mut self, source_key: &str) -> Self {
        self.key = format!("{}/{}", source_key, self.tile_coord);
        self
    }

    /// Set whether the renderer should interpolate when resampling.
    pub fn with_interpolate(mut self, interpolate: bool) -> Self {
        self.interpolate = interpolate;
        self
    }

    /// Set the opacity transition duration. `Duration::ZERO` disables fading.
    pub fn with_transition(mut self, transition: Duration) -> Self {
        self.transition = transition;
        self
    }

    /// Process-unique identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn tile_coord(&self) -> TileCoord {
        self.tile_coord
    }

    /// Cache invalidation key: `<source key>/z/x/y`.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn interpolate(&self) -> bool {
        self.interpolate
    }

    pub fn state(&self) -> TileState {
        self.lock_inner().state
    }

    /// Loaded content, if any.
    pub fn data(&self) -> Option<Bytes> {
        self.lock_inner().data.clone()
    }

    /// Move the tile to `state` and notify listeners.
    ///
    /// Returns `false` if the tile is already in `state` or in a final state
    /// ([`TileState::is_final`]); nothing is broadcast in that case.
    pub fn set_state(&self, state: TileState) -> bool {
        self.update_state(state, |current| !current.is_final())
    }

    /// Start loading the tile on the current tokio runtime.
    ///
    /// Does nothing unless the tile is `Idle` or `Error`. Without a runtime
    /// the tile moves straight to `Error`.
    pub fn load(self: &Arc<Self>) {
        if !self.state().is_loadable() {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!(tile = %self.tile_coord, "No async runtime available to load tile");
            self.set_state(TileState::Error);
            return;
        };

        if !self.update_state(TileState::Loading, TileState::is_loadable) {
            return;
        }

        let tile = Arc::clone(self);
        let task = runtime.spawn(async move {
            let result = tile.loader.load(tile.tile_coord).await;
            tile.finish_load(result);
        });

        let mut inner = self.lock_inner();
        if inner.state == TileState::Loading {
            inner.task = Some(task.abort_handle());
        }
    }

    /// Free held resources.
    ///
    /// A tile released mid-load has its load task aborted and moves to
    /// [`TileState::Aborted`], so anything counting in-flight loads sees it
    /// leave `Loading`.
    pub fn release(&self) {
        let task = {
            let mut inner = self.lock_inner();
            inner.data = None;
            inner.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }

        self.update_state(TileState::Aborted, |current| {
            current == TileState::Loading
        });
        self.lock_transitions().clear();
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Subscribe to state transitions.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Tile) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.lock_listeners().push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe. Returns `false` if the listener was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    // =========================================================================
    // Opacity transitions
    // =========================================================================

    /// Opacity for the renderer identified by `id` at `now`, in `0.0..=1.0`.
    ///
    /// The first call for an `id` starts the fade-in.
    pub fn alpha(&self, id: u64, now: Instant) -> f32 {
        if self.transition.is_zero() {
            return 1.0;
        }

        let start = {
            let mut starts = self.lock_transitions();
            match *starts.entry(id).or_insert(Transition::Started(now)) {
                Transition::Started(start) => start,
                Transition::Ended => return 1.0,
            }
        };

        let elapsed = now.saturating_duration_since(start) + FRAME_OFFSET;
        if elapsed >= self.transition {
            return 1.0;
        }
        let progress = elapsed.as_secs_f32() / self.transition.as_secs_f32();
        progress.powi(3)
    }

    /// Whether the renderer identified by `id` is still fading this tile in.
    pub fn in_transition(&self, id: u64) -> bool {
        if self.transition.is_zero() {
            return false;
        }
        !matches!(self.lock_transitions().get(&id), Some(Transition::Ended))
    }

    /// Mark the fade-in as finished for the renderer identified by `id`.
    pub fn end_transition(&self, id: u64) {
        if !self.transition.is_zero() {
            self.lock_transitions().insert(id, Transition::Ended);
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn finish_load(&self, result: Result<Option<Bytes>, LoadError>) {
        let (state, data) = match result {
            Ok(Some(data)) => (TileState::Loaded, Some(data)),
            Ok(None) => (TileState::Empty, None),
            Err(e) => {
                warn!(tile = %self.tile_coord, error = %e, "Tile load failed");
                (TileState::Error, None)
            }
        };

        {
            let mut inner = self.lock_inner();
            if inner.state != TileState::Loading {
                // released while the loader was running
                return;
            }
            inner.task = None;
            inner.data = data;
        }

        self.update_state(state, |current| current == TileState::Loading);
    }

    fn update_state<F>(&self, state: TileState, accept: F) -> bool
    where
        F: FnOnce(TileState) -> bool,
    {
        let previous = {
            let mut inner = self.lock_inner();
            if inner.state == state || !accept(inner.state) {
                return false;
            }
            std::mem::replace(&mut inner.state, state)
        };

        debug!(
            tile = %self.key,
            from = %previous,
            to = %state,
            "Tile state changed"
        );

        let listeners: Vec<TileListener> = self
            .lock_listeners()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(self);
        }
        true
    }

    fn lock_inner(&self) -> MutexGuard<'_, TileInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<(ListenerId, TileListener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_transitions(&self) -> MutexGuard<'_, HashMap<u64, Transition>> {
        self.transition_starts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
