//! Test utilities for integration tests.
//!
//! This module provides mock loaders with controllable completion and
//! helpers for waiting on asynchronous tile state changes.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use tile_supply::error::LoadError;
use tile_supply::tile::{TileCoord, TileLoader};

// =============================================================================
// Gated Loader
// =============================================================================

/// A loader whose loads block until the test opens the gate.
///
/// Each call to [`GatedLoader::open`] lets `n` waiting (or future) loads
/// finish. Coordinates listed with [`GatedLoader::fail`] finish with an
/// error, and those listed with [`GatedLoader::empty`] finish without content.
#[derive(Clone)]
pub struct GatedLoader {
    gate: Arc<Semaphore>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    failing: Arc<Mutex<HashSet<TileCoord>>>,
    empty: Arc<Mutex<HashSet<TileCoord>>>,
}

impl GatedLoader {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            started: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(Mutex::new(HashSet::new())),
            empty: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Let `n` loads complete.
    pub fn open(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Make loads of `coord` fail.
    pub fn fail(&self, coord: TileCoord) {
        self.failing.lock().unwrap().insert(coord);
    }

    /// Make loads of `coord` succeed without content.
    pub fn empty(&self, coord: TileCoord) {
        self.empty.lock().unwrap().insert(coord);
    }

    /// Stop failing loads of `coord`.
    pub fn heal(&self, coord: TileCoord) {
        self.failing.lock().unwrap().remove(&coord);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileLoader for GatedLoader {
    async fn load(&self, coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
        self.started.fetch_add(1, Ordering::SeqCst);

        match self.gate.acquire().await {
            Ok(permit) => permit.forget(),
            Err(_) => return Err(LoadError::Aborted),
        }
        self.finished.fetch_add(1, Ordering::SeqCst);

        if self.failing.lock().unwrap().contains(&coord) {
            return Err(LoadError::Connection(format!("refused {}", coord)));
        }
        if self.empty.lock().unwrap().contains(&coord) {
            return Ok(None);
        }
        Ok(Some(Bytes::from(coord.key())))
    }
}

// =============================================================================
// Immediate Loader
// =============================================================================

/// A loader that completes every load right away and counts requests.
#[derive(Clone, Default)]
pub struct ImmediateLoader {
    requests: Arc<AtomicUsize>,
}

impl ImmediateLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileLoader for ImmediateLoader {
    async fn load(&self, coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Bytes::from(coord.key())))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Poll `condition` until it holds, yielding to spawned load tasks in between.
///
/// Panics after two seconds.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Row-major coordinates of a `size` x `size` block at zoom `z`.
pub fn block(z: u8, size: i32) -> Vec<TileCoord> {
    (0..size)
        .flat_map(|y| (0..size).map(move |x| TileCoord::new(z, x, y)))
        .collect()
}
