//! Simulated tile backend.
//!
//! This module provides a [`TileLoader`] that stands in for a network
//! fetch: each load sleeps for a fixed latency and then succeeds, fails or
//! reports no content on a deterministic schedule. It drives the
//! `tile-supply` binary and the integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::error::LoadError;
use crate::tile::{TileCoord, TileLoader};

/// Default simulated network latency.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(40);

/// Size of the payload returned for a loaded tile.
const PAYLOAD_SIZE: usize = 256;

/// Counters shared by a loader and whoever observes it.
#[derive(Debug, Default)]
pub struct LoaderStats {
    requested: AtomicU64,
    loaded: AtomicU64,
    failed: AtomicU64,
    empty: AtomicU64,
}

/// Point-in-time copy of [`LoaderStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoaderSnapshot {
    pub requested: u64,
    pub loaded: u64,
    pub failed: u64,
    pub empty: u64,
}

impl LoaderStats {
    pub fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            requested: self.requested.load(Ordering::SeqCst),
            loaded: self.loaded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            empty: self.empty.load(Ordering::SeqCst),
        }
    }
}

/// Loader that simulates latency, failures and missing tiles.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tile_supply::source::SimulatedLoader;
///
/// // Every 10th request fails, every 7th has no content
/// let loader = SimulatedLoader::new(Duration::from_millis(20))
///     .with_fail_every(10)
///     .with_empty_every(7);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedLoader {
    latency: Duration,
    fail_every: u64,
    empty_every: u64,
    stats: Arc<LoaderStats>,
}

impl SimulatedLoader {
    /// Create a loader that always succeeds after `latency`.
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            fail_every: 0,
            empty_every: 0,
            stats: Arc::new(LoaderStats::default()),
        }
    }

    /// Fail every `n`th request (`0` never fails).
    pub fn with_fail_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Report no content for every `n`th request (`0` never).
    pub fn with_empty_every(mut self, n: u64) -> Self {
        self.empty_every = n;
        self
    }

    /// Shared counters of this loader.
    pub fn stats(&self) -> Arc<LoaderStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for SimulatedLoader {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY)
    }
}

#[async_trait]
impl TileLoader for SimulatedLoader {
    async fn load(&self, coord: TileCoord) -> Result<Option<Bytes>, LoadError> {
        let request = self.stats.requested.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.fail_every > 0 && request % self.fail_every == 0 {
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            return Err(LoadError::Connection(format!(
                "simulated failure for {}",
                coord
            )));
        }

        if self.empty_every > 0 && request % self.empty_every == 0 {
            self.stats.empty.fetch_add(1, Ordering::SeqCst);
            return Ok(None);
        }

        self.stats.loaded.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Bytes::from(vec![coord.z; PAYLOAD_SIZE])))
    }
}
