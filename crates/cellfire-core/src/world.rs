//! The world: cell grid, logical clock, and tick orchestration.
//!
//! A tick runs in four strictly ordered steps:
//!
//! 1. **Move**: every cell moves its fireflies and reports the ones that left
//!    its borders. The world waits on the move countdown.
//! 2. **Migrate**: the world applies every reported migration, one at a
//!    time. This is the only place where cell membership changes.
//! 3. **Blink**: every cell scans for due fireflies and drains its blink
//!    queue. The world waits until the quiescence countdown reaches zero,
//!    then broadcasts the end of the round.
//! 4. The clock advances by one tick length.
//!
//! Blinks are evaluated at the clock value the tick started with, so the
//! very first tick happens at time zero.
//!
//! While it waits on a phase counter, the world also listens for failure
//! reports from the cell workers. A failed worker ends the step with
//! [`WorldError::CellFailed`] and halts the world; every later phase returns
//! [`WorldError::Halted`] until it is shut down.

use std::sync::Arc;

use cellfire_events::BlinkSink;
use cellfire_types::{CellCoord, Direction, FireflyId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::blink::{BlinkInbox, BlinkSignal};
use crate::cell::{Cell, CellChannels, CellCommand, CellFailure, CellSummary};
use crate::clock::{ClockError, SimClock};
use crate::config::{ConfigError, SimulationConfig, SwarmConfig};
use crate::countdown::{Countdown, CountdownError};
use crate::firefly::Firefly;
use crate::geometry::Geometry;
use crate::grid::{Grid, Tunables};
use crate::migration::{Migration, MigrationBatch};

/// Rounds the end-of-blink broadcast can buffer for a slow cell.
const ROUND_DONE_CAPACITY: usize = 16;

/// Errors raised while building or stepping the world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The configuration does not describe a usable world.
    #[error("invalid world configuration: {source}")]
    InvalidConfig {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// Grid dimensions or cell size are unusable.
    #[error("invalid geometry: {reason}")]
    InvalidGeometry {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A coordinate outside the grid was used.
    #[error("no cell at {cell}")]
    CellNotFound {
        /// The offending coordinate.
        cell: CellCoord,
    },

    /// A cell worker stopped while the world still needed it.
    #[error("worker of cell {cell} is gone")]
    WorkerGone {
        /// The cell whose worker stopped.
        cell: CellCoord,
    },

    /// The migration channel closed before every cell reported.
    #[error("migration channel closed during the move phase")]
    MigrationsClosed,

    /// A migration named a source cell that does not own the firefly.
    #[error("firefly {firefly} is not in cell {cell}")]
    FireflyNotFound {
        /// The firefly that was looked up.
        firefly: FireflyId,
        /// The cell that was expected to own it.
        cell: CellCoord,
    },

    /// No cell owns the firefly.
    #[error("no cell owns firefly {firefly}")]
    UnknownFirefly {
        /// The firefly that was looked up.
        firefly: FireflyId,
    },

    /// A firefly position is NaN or infinite.
    #[error("firefly {firefly} has a non-finite position ({x}, {y})")]
    InvalidPosition {
        /// The rejected firefly.
        firefly: FireflyId,
        /// Its horizontal position.
        x: f32,
        /// Its vertical position.
        y: f32,
    },

    /// A cell worker stopped in the middle of a phase.
    #[error("worker of cell {cell} failed: {reason}")]
    CellFailed {
        /// The cell whose worker stopped.
        cell: CellCoord,
        /// What the worker reported.
        reason: String,
    },

    /// Every cell worker stopped without reporting why.
    #[error("all cell workers stopped")]
    WorkersStopped,

    /// A cell worker failed earlier; the world can only be shut down.
    #[error("world halted after a cell worker failed")]
    Halted,

    /// More fireflies than identifiers.
    #[error("firefly identifiers exhausted")]
    IdsExhausted,

    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A phase counter was decremented too often.
    #[error("countdown error: {source}")]
    Countdown {
        /// The underlying countdown error.
        #[from]
        source: CountdownError,
    },
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Number of the tick, starting at 1.
    pub tick: u64,
    /// Logical time at which the tick's blinks were evaluated.
    pub clock: u64,
    /// Firings during the tick.
    pub blinks: u64,
    /// Fireflies that changed cell during the tick.
    pub migrations: usize,
}

/// The simulated world.
#[derive(Debug)]
pub struct World {
    grid: Arc<Grid>,
    cells: Vec<Cell>,
    clock: SimClock,
    migrations: mpsc::UnboundedReceiver<MigrationBatch>,
    round_done: broadcast::Sender<u64>,
    failures: mpsc::UnboundedReceiver<CellFailure>,
    halted: bool,
    swarm: SwarmConfig,
    rng: StdRng,
    next_id: u32,
}

impl World {
    /// Build the grid and start one worker per cell.
    ///
    /// Must be called from inside a tokio runtime. Every firing is reported
    /// to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidConfig`] if the configuration fails
    /// validation and [`WorldError::InvalidGeometry`] if the grid is empty.
    pub fn new(config: &SimulationConfig, sink: Arc<dyn BlinkSink>) -> Result<Self, WorldError> {
        config.validate()?;
        let geometry = Geometry::new(
            config.world.columns,
            config.world.rows,
            config.world.cell_size,
        )?;
        let clock = SimClock::new(&config.time)?;
        let mut rng = StdRng::seed_from_u64(config.world.seed);

        let mut inboxes = Vec::with_capacity(geometry.cell_count());
        let mut receivers = Vec::with_capacity(geometry.cell_count());
        for coord in geometry.coords() {
            let (inbox, rx) = BlinkInbox::new(coord);
            inboxes.push(inbox);
            receivers.push(rx);
        }

        let grid = Arc::new(Grid::new(
            geometry,
            Tunables::from_config(config),
            inboxes,
            sink,
        ));
        let (migrations_tx, migrations) = mpsc::unbounded_channel();
        let (round_done, _) = broadcast::channel(ROUND_DONE_CAPACITY);
        let (failures_tx, failures) = mpsc::unbounded_channel();

        let cells = geometry
            .coords()
            .zip(receivers)
            .map(|(coord, blinks)| {
                let channels = CellChannels {
                    blinks,
                    round_done: round_done.subscribe(),
                    migrations: migrations_tx.clone(),
                    failures: failures_tx.clone(),
                };
                let cell_rng = StdRng::seed_from_u64(rng.random());
                Cell::spawn(coord, Arc::clone(&grid), channels, cell_rng)
            })
            .collect();

        info!(
            columns = geometry.columns(),
            rows = geometry.rows(),
            cell_size = geometry.cell_size(),
            tick_len_us = clock.tick_len(),
            "World created"
        );

        Ok(Self {
            grid,
            cells,
            clock,
            migrations,
            round_done,
            failures,
            halted: false,
            swarm: config.swarm.clone(),
            rng,
            next_id: 0,
        })
    }

    /// Shape of the world.
    pub fn geometry(&self) -> &Geometry {
        &self.grid.geometry
    }

    /// The logical clock.
    pub const fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Every cell, in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The cell at `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellNotFound`] if `coord` is outside the grid.
    pub fn cell(&self, coord: CellCoord) -> Result<&Cell, WorldError> {
        self.grid
            .geometry
            .index_of(coord)
            .and_then(|idx| self.cells.get(idx))
            .ok_or(WorldError::CellNotFound { cell: coord })
    }

    /// Blink signals waiting in the queue of the cell at `coord`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellNotFound`] if `coord` is outside the grid.
    pub fn queued_blinks(&self, coord: CellCoord) -> Result<usize, WorldError> {
        Ok(self.grid.inbox(coord)?.queued())
    }

    /// Firings recorded since the world was built.
    pub fn total_blinks(&self) -> u64 {
        self.grid.blink_count()
    }

    /// Hatch `n` fireflies at random positions and orientations.
    ///
    /// Periods are drawn from the configured range and the first blink falls
    /// between the configured minimum and one period from now. Returns the
    /// identifiers of the new fireflies.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::IdsExhausted`] if identifiers run out.
    pub async fn hatch_fireflies(&mut self, n: u32) -> Result<Vec<FireflyId>, WorldError> {
        let geometry = self.grid.geometry;
        let mut hatched = Vec::with_capacity(usize::try_from(n).unwrap_or(0));

        for _ in 0..n {
            let x = self.rng.random::<f32>() * geometry.width();
            let y = self.rng.random::<f32>() * geometry.height();
            let orientation = self.rng.random_range(0..360);
            let period = self
                .rng
                .random_range(self.swarm.period_min_us..=self.swarm.period_max_us);
            let first_blink = self
                .rng
                .random_range(self.swarm.first_blink_min_us.min(period)..=period);
            let next_blink = self.clock.now().saturating_add(first_blink);

            let id = FireflyId::new(self.next_id);
            let firefly = Firefly::new(id, x, y, orientation, period, next_blink);
            self.insert_firefly(firefly).await?;
            hatched.push(id);
        }

        info!(hatched = hatched.len(), "Fireflies hatched");
        Ok(hatched)
    }

    /// Place a firefly in the cell that owns its (wrapped) position.
    ///
    /// Returns the cell it entered.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPosition`] for a NaN or infinite
    /// coordinate and [`WorldError::IdsExhausted`] if the id is `u32::MAX`.
    pub async fn insert_firefly(&mut self, mut firefly: Firefly) -> Result<CellCoord, WorldError> {
        ensure_finite(&firefly)?;
        let geometry = self.grid.geometry;
        let (x, y) = geometry.wrap_position(firefly.x(), firefly.y());
        firefly.place(x, y);

        let after = firefly
            .id()
            .into_inner()
            .checked_add(1)
            .ok_or(WorldError::IdsExhausted)?;
        self.next_id = self.next_id.max(after);

        let to = geometry.cell_of(x, y);
        self.apply_migration(Migration::hatch(firefly, to)).await?;
        Ok(to)
    }

    /// Move a firefly between cells.
    ///
    /// Removes it from the source cell (if any) and inserts the migrated
    /// state into the destination.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FireflyNotFound`] if the source cell does not
    /// own the firefly, [`WorldError::CellNotFound`] for coordinates
    /// outside the grid and [`WorldError::InvalidPosition`] for a NaN or
    /// infinite position.
    pub async fn apply_migration(&self, migration: Migration) -> Result<(), WorldError> {
        ensure_finite(migration.firefly())?;
        let id = migration.firefly().id();
        let destination = self.cell(migration.to())?;
        if let Some(from) = migration.from() {
            self.cell(from)?
                .leave(id)
                .await
                .ok_or(WorldError::FireflyNotFound {
                    firefly: id,
                    cell: from,
                })?;
        }
        destination.enter(migration.into_firefly()).await;
        Ok(())
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns an error if a cell worker is gone, a migration is
    /// inconsistent, or the clock overflows.
    pub async fn step(&mut self) -> Result<TickSummary, WorldError> {
        let migrations = self.move_phase().await?;
        let clock = self.clock.now();
        let blinks = self.blink_phase().await?;
        self.clock.advance()?;

        let summary = TickSummary {
            tick: self.clock.tick(),
            clock,
            blinks,
            migrations,
        };
        debug!(
            tick = summary.tick,
            clock = summary.clock,
            blinks = summary.blinks,
            migrations = summary.migrations,
            "Tick complete"
        );
        Ok(summary)
    }

    /// Move every firefly and apply the resulting migrations.
    ///
    /// Returns the number of migrations applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker is gone or a migration is inconsistent.
    pub async fn move_phase(&mut self) -> Result<usize, WorldError> {
        self.ensure_running()?;
        let n = self.cells.len();
        self.grid.move_phase.reset(u64::try_from(n).unwrap_or(u64::MAX));
        for cell in &self.cells {
            cell.send(CellCommand::Move)?;
        }
        self.wait_for_cells(|grid| &grid.move_phase).await?;

        let mut batches = Vec::with_capacity(n);
        for _ in 0..n {
            let batch = self
                .migrations
                .recv()
                .await
                .ok_or(WorldError::MigrationsClosed)?;
            batches.push(batch);
        }
        // Cells finish in any order; apply in row-major order.
        batches.sort_by_key(|batch| (batch.from.cy, batch.from.cx));

        let mut applied: usize = 0;
        for batch in batches {
            for migration in batch.migrations {
                self.apply_migration(migration).await?;
                applied = applied.saturating_add(1);
            }
        }
        Ok(applied)
    }

    /// Fire due fireflies and propagate blinks until the grid is quiescent.
    ///
    /// Returns the number of firings.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerGone`] if a cell cannot be reached.
    pub async fn blink_phase(&mut self) -> Result<u64, WorldError> {
        self.ensure_running()?;
        let before = self.grid.blink_count();
        let clock = self.clock.now();

        for inbox in &self.grid.inboxes {
            inbox.wake().await;
        }
        let participants = u64::try_from(self.cells.len()).unwrap_or(u64::MAX);
        self.grid.quiescence.reset(participants);
        for cell in &self.cells {
            cell.send(CellCommand::Blink { clock })?;
        }
        self.wait_for_cells(|grid| &grid.quiescence).await?;

        if self.round_done.send(clock).is_err() {
            warn!(clock, "No cell is listening for the end of the blink round");
        }
        Ok(self.grid.blink_count().saturating_sub(before))
    }

    /// Whether a cell worker failure has halted the world.
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    const fn ensure_running(&self) -> Result<(), WorldError> {
        if self.halted {
            return Err(WorldError::Halted);
        }
        Ok(())
    }

    /// Wait until the phase counter picked by `countdown` reaches zero, or
    /// until a worker reports that it will never get there.
    async fn wait_for_cells(
        &mut self,
        countdown: fn(&Grid) -> &Countdown,
    ) -> Result<(), WorldError> {
        let grid = Arc::clone(&self.grid);
        let failure = tokio::select! {
            biased;
            failure = self.failures.recv() => failure,
            () = countdown(&grid).wait() => return Ok(()),
        };

        self.halted = true;
        let Some(CellFailure { cell, reason }) = failure else {
            return Err(WorldError::WorkersStopped);
        };
        error!(cell = %cell, reason = %reason, "Cell worker failed, halting the world");
        Err(WorldError::CellFailed { cell, reason })
    }

    /// Enqueue a blink of `signal` on the neighbor of `origin` across
    /// `direction`, wrapping around the torus. Returns the receiving cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellNotFound`] for an origin outside the grid
    /// and [`WorldError::WorkerGone`] if the neighbor's worker stopped.
    pub async fn send_blink_to_neighbor(
        &self,
        signal: BlinkSignal,
        origin: CellCoord,
        direction: Direction,
    ) -> Result<CellCoord, WorldError> {
        if self.grid.geometry.index_of(origin).is_none() {
            return Err(WorldError::CellNotFound { cell: origin });
        }
        self.grid.send_blink_to(signal, origin, direction).await
    }

    /// Forward a blink of firefly `id` to every neighbor whose shared edge
    /// is within the border distance. Returns the number of neighbors
    /// reached.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownFirefly`] if no cell owns the firefly.
    pub async fn propagate_blink(&self, id: FireflyId) -> Result<usize, WorldError> {
        let (coord, firefly) = self
            .find_firefly(id)
            .await
            .ok_or(WorldError::UnknownFirefly { firefly: id })?;
        let borders = self.cell(coord)?.borders();
        self.grid.propagate(firefly.signal(), coord, &borders).await
    }

    /// Total number of fireflies across all cells.
    pub async fn firefly_count(&self) -> usize {
        let mut total: usize = 0;
        for cell in &self.cells {
            total = total.saturating_add(cell.len().await);
        }
        total
    }

    /// Locate a firefly. Returns its cell and a copy of its state.
    pub async fn find_firefly(&self, id: FireflyId) -> Option<(CellCoord, Firefly)> {
        for cell in &self.cells {
            if let Some(firefly) = cell.firefly(id).await {
                return Some((cell.coord(), firefly));
            }
        }
        None
    }

    /// Edit a firefly in place, wherever it lives.
    ///
    /// Position changes are not allowed here; use
    /// [`insert_firefly`](Self::insert_firefly) for a new placement.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::UnknownFirefly`] if no cell owns the firefly.
    pub async fn update_firefly(
        &self,
        id: FireflyId,
        edit: impl FnOnce(&mut Firefly),
    ) -> Result<(), WorldError> {
        let (coord, _) = self
            .find_firefly(id)
            .await
            .ok_or(WorldError::UnknownFirefly { firefly: id })?;
        let cell = self.cell(coord)?;
        cell.update(|fireflies| fireflies.get_mut(&id).map(edit))
            .await
            .ok_or(WorldError::FireflyNotFound {
                firefly: id,
                cell: coord,
            })
    }

    /// Copy of every firefly in every cell.
    pub async fn fireflies(&self) -> Vec<Firefly> {
        let mut all = Vec::new();
        for cell in &self.cells {
            all.extend(cell.snapshot().await);
        }
        all
    }

    /// Point-in-time view of the whole world, for display.
    pub async fn describe(&self) -> WorldSummary {
        let mut cells = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            cells.push(cell.summary().await);
        }
        WorldSummary {
            geometry: self.grid.geometry,
            clock: self.clock.now(),
            cells,
        }
    }

    /// Stop every cell worker and wait for them to exit.
    ///
    /// Workers left waiting for the end of a blink round by a failed step
    /// are released by closing the round broadcast first.
    pub async fn shutdown(self) {
        let Self {
            cells, round_done, ..
        } = self;
        drop(round_done);

        let count = cells.len();
        for cell in cells {
            cell.shutdown().await;
        }
        debug!(cells = count, "World shut down");
    }
}

const fn ensure_finite(firefly: &Firefly) -> Result<(), WorldError> {
    if firefly.x().is_finite() && firefly.y().is_finite() {
        return Ok(());
    }
    Err(WorldError::InvalidPosition {
        firefly: firefly.id(),
        x: firefly.x(),
        y: firefly.y(),
    })
}

/// Point-in-time view of the world.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    /// Shape of the world.
    pub geometry: Geometry,
    /// Logical time of the view.
    pub clock: u64,
    /// Every cell, in row-major order.
    pub cells: Vec<CellSummary>,
}

impl core::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let g = &self.geometry;
        write!(
            f,
            "W: {}x{} ({:.2}) {:.2}x{:.2} @ {}us",
            g.columns(),
            g.rows(),
            g.cell_size(),
            g.width(),
            g.height(),
            self.clock
        )?;
        for cell in &self.cells {
            write!(f, "\nC: {cell}")?;
        }
        Ok(())
    }
}
