//! State shared by every cell worker and the world.
//!
//! Everything here is either immutable for the whole run (geometry, trig
//! table, tunables) or synchronized on its own (inboxes, countdowns, the
//! blink sink). Cells hold an `Arc<Grid>` and use it to reach their
//! neighbors; they never touch another cell's fireflies.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cellfire_events::{BlinkRecord, BlinkSink};
use cellfire_types::{CellCoord, Direction};
use tracing::trace;

use crate::blink::{BlinkInbox, BlinkSignal};
use crate::config::SimulationConfig;
use crate::countdown::Countdown;
use crate::geometry::{Borders, Geometry};
use crate::trig::TrigTable;
use crate::world::WorldError;

/// Per-run constants of the movement and coupling model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunables {
    /// Distance covered by one Move.
    pub step_length: f32,
    /// Maximum random turn per Move, in degrees.
    pub turn_jitter: i32,
    /// How far a blink pulls a neighbor's deadline earlier.
    pub nudge_amount: u64,
    /// Only fireflies closer than this are nudged.
    pub nudge_radius: f32,
    /// Edge distance under which a blink is forwarded to the neighbor cell.
    pub border_distance: f32,
}

impl Tunables {
    /// Extract the tunables from a configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            step_length: config.swarm.step_length,
            turn_jitter: i32::from(config.swarm.turn_jitter_degrees),
            nudge_amount: config.coupling.nudge_amount_us,
            nudge_radius: config.coupling.nudge_radius,
            border_distance: config.coupling.border_distance(),
        }
    }
}

/// The shared part of the world.
pub(crate) struct Grid {
    pub(crate) geometry: Geometry,
    pub(crate) trig: TrigTable,
    pub(crate) tunables: Tunables,
    pub(crate) inboxes: Vec<BlinkInbox>,
    pub(crate) quiescence: Countdown,
    pub(crate) move_phase: Countdown,
    sink: Arc<dyn BlinkSink>,
    blinks: AtomicU64,
}

impl Grid {
    pub(crate) fn new(
        geometry: Geometry,
        tunables: Tunables,
        inboxes: Vec<BlinkInbox>,
        sink: Arc<dyn BlinkSink>,
    ) -> Self {
        Self {
            geometry,
            trig: TrigTable::new(),
            tunables,
            inboxes,
            quiescence: Countdown::new("quiescence"),
            move_phase: Countdown::new("move"),
            sink,
            blinks: AtomicU64::new(0),
        }
    }

    pub(crate) fn inbox(&self, coord: CellCoord) -> Result<&BlinkInbox, WorldError> {
        self.geometry
            .index_of(coord)
            .and_then(|idx| self.inboxes.get(idx))
            .ok_or(WorldError::CellNotFound { cell: coord })
    }

    /// Enqueue `signal` on the neighbor of `origin` across `direction`.
    /// Returns the neighbor that received it.
    pub(crate) async fn send_blink_to(
        &self,
        signal: BlinkSignal,
        origin: CellCoord,
        direction: Direction,
    ) -> Result<CellCoord, WorldError> {
        let target = self.geometry.neighbor(origin, direction);
        trace!(
            firefly = %signal.firefly,
            from = %origin,
            to = %target,
            ?direction,
            "Blink forwarded"
        );
        self.inbox(target)?
            .deliver(signal, &self.quiescence)
            .await?;
        Ok(target)
    }

    /// Forward `signal` to every neighbor whose shared edge is within the
    /// border distance. Returns how many neighbors were reached.
    pub(crate) async fn propagate(
        &self,
        signal: BlinkSignal,
        origin: CellCoord,
        borders: &Borders,
    ) -> Result<usize, WorldError> {
        let mut sent: usize = 0;
        for direction in borders.edges_near(signal.x, signal.y, self.tunables.border_distance) {
            self.send_blink_to(signal, origin, direction).await?;
            sent = sent.saturating_add(1);
        }
        Ok(sent)
    }

    /// Emit the record of one firing.
    pub(crate) fn record_blink(&self, signal: &BlinkSignal, clock: u64) {
        self.sink.record(BlinkRecord::at(signal.firefly, clock));
        self.blinks.fetch_add(1, Ordering::Relaxed);
    }

    /// Firings recorded since the grid was built.
    pub(crate) fn blink_count(&self) -> u64 {
        self.blinks.load(Ordering::Relaxed)
    }
}

impl core::fmt::Debug for Grid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Grid")
            .field("geometry", &self.geometry)
            .field("tunables", &self.tunables)
            .field("cells", &self.inboxes.len())
            .field("blinks", &self.blink_count())
            .finish_non_exhaustive()
    }
}
