use thiserror::Error;

/// Errors raised by [`LruCache`](crate::collections::LruCache) when a caller
/// breaks one of its preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// `set` was called with a key that is already cached
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The key is not present in the cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// `pop` or `delete_oldest` was called on an empty cache
    #[error("Cache is empty")]
    Empty,
}

/// Errors raised by [`PriorityQueue`](crate::collections::PriorityQueue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// `dequeue` was called on an empty queue
    #[error("Queue is empty")]
    Empty,
}

/// Errors a [`TileLoader`](crate::tile::TileLoader) may report.
///
/// These never escape the queue or the cache. A failed load is only visible
/// as the tile's [`TileState::Error`](crate::tile::TileState::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The payload was fetched but could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// The load was cancelled before it completed
    #[error("Load aborted")]
    Aborted,
}

/// Errors that can occur when parsing a `z/x/y` tile key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    /// Wrong number of `/`-separated components
    #[error("Invalid tile key '{0}': expected z/x/y")]
    Malformed(String),

    /// A component is not a valid integer
    #[error("Invalid {component} in tile key '{key}'")]
    InvalidComponent { key: String, component: &'static str },
}
