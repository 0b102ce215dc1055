//! Generic containers used by the tile pipeline.
//!
//! Neither container knows anything about tiles:
//!
//! - [`LruCache`]: string-keyed cache with recency tracking and an explicit,
//!   keep-set aware expiry pass
//! - [`PriorityQueue`]: binary min-heap de-duplicated by a key function

mod lru;
mod priority_queue;

pub use lru::{Iter, LruCache, DEFAULT_HIGH_WATER_MARK};
pub use priority_queue::{KeyFunction, PriorityFunction, PriorityQueue, DROP};
