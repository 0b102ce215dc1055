//! Tile coordinates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordError;

/// Grid position of a tile: zoom level plus column and row.
///
/// Rendered as `z/x/y`, which is also the key tiles are cached under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,

    /// Column (0-indexed from the left edge of the grid)
    pub x: i32,

    /// Row (0-indexed from the top edge of the grid)
    pub y: i32,
}

impl TileCoord {
    pub const fn new(z: u8, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// Cache key, `z/x/y`.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Centre of the tile in tile units at its own zoom level.
    pub fn center(&self) -> (f64, f64) {
        (f64::from(self.x) + 0.5, f64::from(self.y) + 0.5)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = CoordError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = key.split('/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(CoordError::Malformed(key.to_string()));
        };

        let invalid = |component| CoordError::InvalidComponent {
            key: key.to_string(),
            component,
        };

        Ok(Self {
            z: z.parse().map_err(|_| invalid("zoom"))?,
            x: x.parse().map_err(|_| invalid("column"))?,
            y: y.parse().map_err(|_| invalid("row"))?,
        })
    }
}
