//! Enumeration types for the Cellfire simulation.

use serde::{Deserialize, Serialize};

/// One of the four edges of a cell, and the neighbor that lies across it.
///
/// The world's y axis grows upward: `Bottom` is the row below (`cy - 1`),
/// `Top` the row above (`cy + 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards column `cx - 1`.
    Left,
    /// Towards column `cx + 1`.
    Right,
    /// Towards row `cy - 1`.
    Bottom,
    /// Towards row `cy + 1`.
    Top,
}

impl Direction {
    /// All four directions in a fixed order.
    pub const ALL: [Self; 4] = [Self::Left, Self::Right, Self::Bottom, Self::Top];

    /// Grid offset `(dcx, dcy)` of the neighbor in this direction.
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::Left => (-1, 0),
            Self::Right => (1, 0),
            Self::Bottom => (0, -1),
            Self::Top => (0, 1),
        }
    }

    /// The direction pointing back across the same edge.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            Self::Bottom => Self::Top,
            Self::Top => Self::Bottom,
        }
    }
}
