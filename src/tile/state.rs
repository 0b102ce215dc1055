use std::fmt;

use serde::Serialize;

/// Load lifecycle of a tile.
///
/// ```text
///            load()            loader ok
///   Idle ───────────▶ Loading ──────────▶ Loaded
///                      │  │ ▲
///            no content│  │ │ load() (retry)
///                      ▼  ▼ │
///                  Empty  Error
///
///   Loading ── release() ──▶ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileState {
    /// Nothing requested yet
    Idle,
    /// A load is in flight
    Loading,
    /// Content is available
    Loaded,
    /// The last load failed; calling `load()` again retries
    Error,
    /// The source has no content for this coordinate
    Empty,
    /// Released while loading; the pending load was cancelled
    Aborted,
}

impl TileState {
    /// Whether `load()` may start a load from this state.
    pub fn is_loadable(self) -> bool {
        matches!(self, TileState::Idle | TileState::Error)
    }

    /// Whether no further transitions may leave this state.
    pub fn is_final(self) -> bool {
        matches!(
            self,
            TileState::Loaded | TileState::Empty | TileState::Aborted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TileState::Idle => "idle",
            TileState::Loading => "loading",
            TileState::Loaded => "loaded",
            TileState::Error => "error",
            TileState::Empty => "empty",
            TileState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
