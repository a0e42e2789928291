//! Torus geometry: world extent, cell lookup, and neighbor wrapping.
//!
//! The world is a `columns x rows` grid of square cells of side `cell_size`.
//! Both axes are periodic, so leaving through one edge re-enters through the
//! opposite one. Every valid position lies in `[0, width) x [0, height)`,
//! and every cell covers the half-open box `[left, right) x [bottom, top)`.

use cellfire_types::{CellCoord, Direction};

use crate::world::WorldError;

/// Immutable shape of the world, shared by every cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    columns: u32,
    rows: u32,
    cell_size: f32,
    width: f32,
    height: f32,
}

impl Geometry {
    /// Build the geometry of a `columns x rows` grid.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidGeometry`] if either dimension is zero or
    /// the cell size is not a positive finite number.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(columns: u32, rows: u32, cell_size: f32) -> Result<Self, WorldError> {
        if columns == 0 || rows == 0 {
            return Err(WorldError::InvalidGeometry {
                reason: format!("grid must have at least one cell, got {columns}x{rows}"),
            });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(WorldError::InvalidGeometry {
                reason: format!("cell size must be positive, got {cell_size}"),
            });
        }
        Ok(Self {
            columns,
            rows,
            cell_size,
            width: columns as f32 * cell_size,
            height: rows as f32 * cell_size,
        })
    }

    /// Number of cell columns.
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of cell rows.
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side of one cell.
    pub const fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Horizontal extent of the torus.
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Vertical extent of the torus.
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Total number of cells.
    pub const fn cell_count(&self) -> usize {
        (self.columns as usize).saturating_mul(self.rows as usize)
    }

    /// Bring any position back inside the world bounds.
    pub fn wrap_position(&self, x: f32, y: f32) -> (f32, f32) {
        (wrap_axis(x, self.width), wrap_axis(y, self.height))
    }

    /// Whether the position lies in `[0, width) x [0, height)`.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..self.width).contains(&x) && (0.0..self.height).contains(&y)
    }

    /// The cell owning an in-bounds position.
    ///
    /// Out-of-bounds input is clamped to the nearest edge cell, so callers
    /// should wrap first.
    pub fn cell_of(&self, x: f32, y: f32) -> CellCoord {
        CellCoord::new(
            axis_cell(x, self.cell_size, self.columns),
            axis_cell(y, self.cell_size, self.rows),
        )
    }

    /// The cell reached by moving `(dcx, dcy)` cells from `from`, wrapping
    /// around the torus. Offsets may be any size.
    pub fn wrap_cell(&self, from: CellCoord, dcx: i64, dcy: i64) -> CellCoord {
        CellCoord::new(
            wrap_index(from.cx, dcx, self.columns),
            wrap_index(from.cy, dcy, self.rows),
        )
    }

    /// The neighbor across one edge of `from`.
    pub fn neighbor(&self, from: CellCoord, direction: Direction) -> CellCoord {
        let (dcx, dcy) = direction.offset();
        self.wrap_cell(from, dcx, dcy)
    }

    /// Row-major index of a cell, or `None` if it is outside the grid.
    pub fn index_of(&self, coord: CellCoord) -> Option<usize> {
        if coord.cx >= self.columns || coord.cy >= self.rows {
            return None;
        }
        let row = (coord.cy as usize).checked_mul(self.columns as usize)?;
        row.checked_add(coord.cx as usize)
    }

    /// Inverse of [`index_of`](Self::index_of).
    pub fn coord_of(&self, index: usize) -> Option<CellCoord> {
        let columns = self.columns as usize;
        let cx = index.checked_rem(columns)?;
        let cy = index.checked_div(columns)?;
        let cy = u32::try_from(cy).ok().filter(|cy| *cy < self.rows)?;
        Some(CellCoord::new(u32::try_from(cx).ok()?, cy))
    }

    /// Every cell coordinate in row-major order.
    pub fn coords(&self) -> impl Iterator<Item = CellCoord> + use<> {
        let columns = self.columns;
        (0..self.rows).flat_map(move |cy| (0..columns).map(move |cx| CellCoord::new(cx, cy)))
    }

    /// The rectangle covered by a cell.
    #[allow(clippy::cast_precision_loss)]
    pub const fn borders(&self, coord: CellCoord) -> Borders {
        let left = coord.cx as f32 * self.cell_size;
        let bottom = coord.cy as f32 * self.cell_size;
        Borders {
            left,
            right: left + self.cell_size,
            bottom,
            top: bottom + self.cell_size,
        }
    }

    /// Manhattan distance between two positions, taking the short way round
    /// on each axis.
    pub const fn toroidal_manhattan(&self, a: (f32, f32), b: (f32, f32)) -> f32 {
        torus_delta(a.0, b.0, self.width) + torus_delta(a.1, b.1, self.height)
    }
}

/// Rectangle covered by one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Borders {
    /// Smallest x inside the cell.
    pub left: f32,
    /// First x past the cell.
    pub right: f32,
    /// Smallest y inside the cell.
    pub bottom: f32,
    /// First y past the cell.
    pub top: f32,
}

impl Borders {
    /// Whether the point lies in `[left, right) x [bottom, top)`.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        (self.left..self.right).contains(&x) && (self.bottom..self.top).contains(&y)
    }

    /// Edges closer than `threshold` to the point.
    ///
    /// At most one horizontal and one vertical edge are reported; when the
    /// point is close to both `left` and `right` (cells narrower than twice
    /// the threshold) only `left` is, and likewise `bottom` wins over `top`.
    pub fn edges_near(
        &self,
        x: f32,
        y: f32,
        threshold: f32,
    ) -> impl Iterator<Item = Direction> + use<> {
        let horizontal = if x - self.left < threshold {
            Some(Direction::Left)
        } else if self.right - x < threshold {
            Some(Direction::Right)
        } else {
            None
        };
        let vertical = if y - self.bottom < threshold {
            Some(Direction::Bottom)
        } else if self.top - y < threshold {
            Some(Direction::Top)
        } else {
            None
        };
        [horizontal, vertical].into_iter().flatten()
    }
}

impl core::fmt::Display for Borders {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "({:8.2}, {:8.2})x({:8.2}, {:8.2})",
            self.left, self.bottom, self.right, self.top
        )
    }
}

fn wrap_axis(v: f32, extent: f32) -> f32 {
    let wrapped = v.rem_euclid(extent);
    // rem_euclid of a tiny negative value rounds up to `extent` itself.
    if wrapped >= extent { 0.0 } else { wrapped }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_cell(v: f32, cell_size: f32, count: u32) -> u32 {
    let raw = (v / cell_size).floor();
    if raw <= 0.0 {
        return 0;
    }
    (raw as u32).min(count.saturating_sub(1))
}

fn wrap_index(start: u32, delta: i64, count: u32) -> u32 {
    let count = i64::from(count);
    let moved = i64::from(start).saturating_add(delta);
    let wrapped = moved.checked_rem_euclid(count).unwrap_or(0);
    u32::try_from(wrapped).unwrap_or(0)
}

const fn torus_delta(a: f32, b: f32, extent: f32) -> f32 {
    let d = (a - b).abs();
    d.min(extent - d)
}
