//! Ownership transfer of a firefly between cells.
//!
//! A migration is produced either when a firefly hatches (no source cell) or
//! when a Move carries it out of its cell. Cells never apply migrations
//! themselves: they send them to the world, which applies every batch
//! between the Move and Blink phases.

use cellfire_types::CellCoord;

use crate::firefly::Firefly;

/// A firefly changing owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Migration {
    firefly: Firefly,
    from: Option<CellCoord>,
    to: CellCoord,
}

impl Migration {
    /// A freshly hatched firefly entering its first cell.
    pub const fn hatch(firefly: Firefly, to: CellCoord) -> Self {
        Self {
            firefly,
            from: None,
            to,
        }
    }

    /// A firefly leaving `from` for `to`.
    pub const fn relocate(firefly: Firefly, from: CellCoord, to: CellCoord) -> Self {
        Self {
            firefly,
            from: Some(from),
            to,
        }
    }

    /// The firefly's state after the move.
    pub const fn firefly(&self) -> &Firefly {
        &self.firefly
    }

    /// The previous owner, `None` for a hatch.
    pub const fn from(&self) -> Option<CellCoord> {
        self.from
    }

    /// The new owner.
    pub const fn to(&self) -> CellCoord {
        self.to
    }

    /// Consume the message and keep the firefly.
    pub const fn into_firefly(self) -> Firefly {
        self.firefly
    }
}

/// Everything one cell emitted during one Move phase.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationBatch {
    /// The cell that produced the batch.
    pub from: CellCoord,
    /// Fireflies that left the cell, in the order they moved.
    pub migrations: Vec<Migration>,
}

impl MigrationBatch {
    /// An empty batch for `from`.
    pub const fn new(from: CellCoord) -> Self {
        Self {
            from,
            migrations: Vec::new(),
        }
    }

    /// Number of migrations in the batch.
    pub const fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Whether no firefly left the cell.
    pub const fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
