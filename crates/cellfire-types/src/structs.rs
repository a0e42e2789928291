//! Core value structs shared across the workspace.

use serde::{Deserialize, Serialize};

/// Position of a cell in the grid: column `cx`, row `cy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoord {
    /// Column index, `0..columns`.
    pub cx: u32,
    /// Row index, `0..rows`.
    pub cy: u32,
}

impl CellCoord {
    /// Create a coordinate from a column and a row.
    pub const fn new(cx: u32, cy: u32) -> Self {
        Self { cx, cy }
    }
}

impl core::fmt::Display for CellCoord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{:>3},{:>3}]", self.cx, self.cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_pads_both_axes() {
        assert_eq!(CellCoord::new(3, 12).to_string(), "[  3, 12]");
        assert_eq!(CellCoord::new(120, 0).to_string(), "[120,  0]");
    }
}
