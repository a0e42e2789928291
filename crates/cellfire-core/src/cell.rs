//! Cell actors.
//!
//! Each cell of the grid runs one long-lived tokio task that owns the
//! fireflies inside the cell's borders. The world drives it with one command
//! per phase:
//!
//! - **Move**: every firefly turns a little and takes one step. Fireflies
//!   that end up in another cell are reported to the world as a
//!   [`MigrationBatch`]; the world moves them once every cell has finished.
//! - **Blink**: fireflies whose deadline has passed fire. Each firing is
//!   queued on this cell's [`BlinkInbox`](crate::blink::BlinkInbox) and on the
//!   inboxes of neighbors whose shared edge is close. The worker then drains
//!   its inbox, nudging every receptive firefly in range, until the world
//!   announces that the whole grid is quiescent.
//!
//! The firefly map sits behind an async mutex shared with the world. The
//! world only locks it between phases, so the worker never waits on it in
//! practice.
//!
//! A worker that stops for any reason other than a shutdown (a phase error or
//! a panic) reports a [`CellFailure`] to the world, which is waiting on the
//! phase counter the dead worker will never reach.

use std::collections::BTreeMap;
use std::sync::Arc;

use cellfire_types::{CellCoord, FireflyId};
use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, trace};

use crate::blink::{BlinkInbox, BlinkSignal};
use crate::firefly::Firefly;
use crate::geometry::Borders;
use crate::grid::Grid;
use crate::migration::MigrationBatch;
use crate::world::WorldError;

/// Fireflies owned by one cell, ordered by id so every phase visits them in
/// the same order.
pub(crate) type FireflyMap = BTreeMap<FireflyId, Firefly>;

/// Instructions from the world to a cell worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CellCommand {
    /// Run the Move phase.
    Move,
    /// Run the Blink phase at logical time `clock`.
    Blink {
        /// Current logical time.
        clock: u64,
    },
    /// Leave the event loop.
    Shutdown,
}

/// Everything a new cell worker needs besides its coordinate.
pub(crate) struct CellChannels {
    pub(crate) blinks: mpsc::UnboundedReceiver<BlinkSignal>,
    pub(crate) round_done: broadcast::Receiver<u64>,
    pub(crate) migrations: mpsc::UnboundedSender<MigrationBatch>,
    pub(crate) failures: mpsc::UnboundedSender<CellFailure>,
}

/// Why a cell worker stopped unexpectedly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFailure {
    /// The cell whose worker stopped.
    pub cell: CellCoord,
    /// What went wrong.
    pub reason: String,
}

/// Handle to one cell and its worker task.
#[derive(Debug)]
pub struct Cell {
    coord: CellCoord,
    borders: Borders,
    fireflies: Arc<Mutex<FireflyMap>>,
    commands: mpsc::UnboundedSender<CellCommand>,
    worker: JoinHandle<()>,
}

impl Cell {
    /// Start the worker of `coord`.
    pub(crate) fn spawn(
        coord: CellCoord,
        grid: Arc<Grid>,
        channels: CellChannels,
        rng: StdRng,
    ) -> Self {
        let borders = grid.geometry.borders(coord);
        let fireflies = Arc::new(Mutex::new(FireflyMap::new()));
        let (commands, command_rx) = mpsc::unbounded_channel();

        let worker = CellWorker {
            coord,
            borders,
            fireflies: Arc::clone(&fireflies),
            grid,
            commands: command_rx,
            blinks: channels.blinks,
            round_done: channels.round_done,
            migrations: channels.migrations,
            rng,
            report: FailureReport::new(coord, channels.failures),
        };

        Self {
            coord,
            borders,
            fireflies,
            commands,
            worker: tokio::spawn(worker.run()),
        }
    }

    /// Grid position of the cell.
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Area covered by the cell.
    pub const fn borders(&self) -> Borders {
        self.borders
    }

    /// Number of fireflies currently owned.
    pub async fn len(&self) -> usize {
        self.fireflies.lock().await.len()
    }

    /// Whether the cell owns no firefly.
    pub async fn is_empty(&self) -> bool {
        self.fireflies.lock().await.is_empty()
    }

    /// Whether the cell owns the firefly `id`.
    pub async fn contains(&self, id: FireflyId) -> bool {
        self.fireflies.lock().await.contains_key(&id)
    }

    /// Copy of one owned firefly.
    pub async fn firefly(&self, id: FireflyId) -> Option<Firefly> {
        self.fireflies.lock().await.get(&id).copied()
    }

    /// Copy of every owned firefly, ordered by id.
    pub async fn snapshot(&self) -> Vec<Firefly> {
        self.fireflies.lock().await.values().copied().collect()
    }

    /// Owned fireflies together with the cell's position, for display.
    pub async fn summary(&self) -> CellSummary {
        CellSummary {
            coord: self.coord,
            borders: self.borders,
            fireflies: self.snapshot().await,
        }
    }

    /// Take ownership of a firefly, replacing any stale copy with the same id.
    pub(crate) async fn enter(&self, firefly: Firefly) {
        self.fireflies.lock().await.insert(firefly.id(), firefly);
    }

    /// Give up ownership of a firefly.
    pub(crate) async fn leave(&self, id: FireflyId) -> Option<Firefly> {
        self.fireflies.lock().await.remove(&id)
    }

    pub(crate) async fn update<R>(&self, edit: impl FnOnce(&mut FireflyMap) -> R) -> R {
        edit(&mut *self.fireflies.lock().await)
    }

    pub(crate) fn send(&self, command: CellCommand) -> Result<(), WorldError> {
        self.commands
            .send(command)
            .map_err(|_closed| WorldError::WorkerGone { cell: self.coord })
    }

    /// Stop the worker and wait for it to exit.
    pub(crate) async fn shutdown(self) {
        // The worker may already be gone; either way we only join it.
        let _ = self.commands.send(CellCommand::Shutdown);
        if let Err(e) = self.worker.await {
            error!(cell = %self.coord, error = %e, "Cell worker panicked");
        }
    }
}

/// Point-in-time view of one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSummary {
    /// Grid position.
    pub coord: CellCoord,
    /// Area covered.
    pub borders: Borders,
    /// Owned fireflies, ordered by id.
    pub fireflies: Vec<Firefly>,
}

impl core::fmt::Display for CellSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}: {:>4} @ {}",
            self.coord,
            self.fireflies.len(),
            self.borders
        )?;
        for firefly in &self.fireflies {
            write!(f, "\n\tF: {firefly}")?;
        }
        Ok(())
    }
}

/// The task side of a cell.
struct CellWorker {
    coord: CellCoord,
    borders: Borders,
    fireflies: Arc<Mutex<FireflyMap>>,
    grid: Arc<Grid>,
    commands: mpsc::UnboundedReceiver<CellCommand>,
    blinks: mpsc::UnboundedReceiver<BlinkSignal>,
    round_done: broadcast::Receiver<u64>,
    migrations: mpsc::UnboundedSender<MigrationBatch>,
    rng: StdRng,
    // Dropped last, so the world only hears about a failure once every
    // channel end owned by this worker is closed.
    report: FailureReport,
}

impl CellWorker {
    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            let result = match command {
                CellCommand::Move => self.move_fireflies().await,
                CellCommand::Blink { clock } => self.blink(clock).await,
                CellCommand::Shutdown => break,
            };
            if let Err(e) = result {
                error!(cell = %self.coord, ?command, error = %e, "Cell phase failed");
                self.report.fail(format!("{command:?} failed: {e}"));
                return;
            }
        }
        self.report.disarm();
        trace!(cell = %self.coord, "Cell worker stopped");
    }

    async fn move_fireflies(&mut self) -> Result<(), WorldError> {
        let grid = Arc::clone(&self.grid);
        let tunables = grid.tunables;
        let mut batch = MigrationBatch::new(self.coord);

        {
            let mut fireflies = self.fireflies.lock().await;
            for firefly in fireflies.values_mut() {
                if tunables.turn_jitter > 0 {
                    let jitter = tunables.turn_jitter;
                    firefly.turn(self.rng.random_range(-jitter..=jitter));
                }
                if let Some(migration) =
                    firefly.advance(&grid.trig, &grid.geometry, tunables.step_length, self.coord)
                {
                    batch.migrations.push(migration);
                }
            }
        }

        trace!(cell = %self.coord, leaving = batch.len(), "Move done");
        self.migrations
            .send(batch)
            .map_err(|_closed| WorldError::MigrationsClosed)?;
        grid.move_phase.done()?;
        Ok(())
    }

    async fn blink(&mut self, clock: u64) -> Result<(), WorldError> {
        let grid = Arc::clone(&self.grid);
        let inbox = grid.inbox(self.coord)?;

        // Scanning: every firefly is receptive again, the overdue ones fire.
        let fired: Vec<BlinkSignal> = {
            let mut fireflies = self.fireflies.lock().await;
            fireflies
                .values_mut()
                .filter_map(|firefly| {
                    firefly.reset_nudgeable();
                    firefly.check_fired(clock).then(|| firefly.signal())
                })
                .collect()
        };
        for signal in fired {
            self.fire(&grid, inbox, signal, clock).await?;
        }
        inbox.vote_idle(&grid.quiescence).await?;

        // Draining: react to queued firings until the world calls the round.
        loop {
            tokio::select! {
                biased;
                maybe = self.blinks.recv() => {
                    let signal = maybe.ok_or(WorldError::WorkerGone { cell: self.coord })?;
                    inbox.taken();
                    self.absorb(&grid, inbox, signal, clock).await?;
                    inbox.vote_idle(&grid.quiescence).await?;
                }
                done = self.round_done.recv() => {
                    match done {
                        Ok(round) if round == clock => break,
                        // Left over from a round this worker abandoned.
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(WorldError::WorkerGone { cell: self.coord });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Nudge every receptive firefly in range of `signal`, firing the ones
    /// that reach their deadline.
    async fn absorb(
        &self,
        grid: &Grid,
        inbox: &BlinkInbox,
        signal: BlinkSignal,
        clock: u64,
    ) -> Result<(), WorldError> {
        let tunables = grid.tunables;
        let fired: Vec<BlinkSignal> = {
            let mut fireflies = self.fireflies.lock().await;
            fireflies
                .values_mut()
                .filter(|other| other.is_nudgeable() && other.id() != signal.firefly)
                .filter(|other| {
                    grid.geometry
                        .toroidal_manhattan(other.position(), signal.position())
                        < tunables.nudge_radius
                })
                .filter_map(|other| {
                    other
                        .nudge(tunables.nudge_amount, clock)
                        .then(|| other.signal())
                })
                .collect()
        };
        for next in fired {
            self.fire(grid, inbox, next, clock).await?;
        }
        Ok(())
    }

    async fn fire(
        &self,
        grid: &Grid,
        inbox: &BlinkInbox,
        signal: BlinkSignal,
        clock: u64,
    ) -> Result<(), WorldError> {
        trace!(cell = %self.coord, firefly = %signal.firefly, clock, "Blink");
        grid.record_blink(&signal, clock);
        inbox.deliver(signal, &grid.quiescence).await?;
        grid.propagate(signal, self.coord, &self.borders).await?;
        Ok(())
    }
}

/// Sends a [`CellFailure`] when dropped, unless the worker stopped cleanly.
///
/// Dropping happens both on an early return and while a panicking worker
/// task is torn down.
struct FailureReport {
    cell: CellCoord,
    tx: mpsc::UnboundedSender<CellFailure>,
    reason: String,
    armed: bool,
}

impl FailureReport {
    fn new(cell: CellCoord, tx: mpsc::UnboundedSender<CellFailure>) -> Self {
        Self {
            cell,
            tx,
            reason: "worker panicked".to_owned(),
            armed: true,
        }
    }

    fn fail(&mut self, reason: String) {
        self.reason = reason;
    }

    const fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FailureReport {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let failure = CellFailure {
            cell: self.cell,
            reason: core::mem::take(&mut self.reason),
        };
        // Nobody is left to tell once the world is gone.
        let _ = self.tx.send(failure);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cellfire_types::FireflyId;

    use super::*;

    #[test]
    fn dropped_report_tells_the_world() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut report = FailureReport::new(CellCoord::new(2, 1), tx);
        report.fail("Move failed: boom".to_owned());
        drop(report);

        let failure = rx.try_recv().unwrap();
        assert_eq!(failure.cell, CellCoord::new(2, 1));
        assert_eq!(failure.reason, "Move failed: boom");
    }

    #[test]
    fn report_defaults_to_a_panic() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(FailureReport::new(CellCoord::new(0, 0), tx));
        assert_eq!(rx.try_recv().unwrap().reason, "worker panicked");
    }

    #[test]
    fn disarmed_report_stays_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut report = FailureReport::new(CellCoord::new(0, 0), tx);
        report.disarm();
        drop(report);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn summary_lists_its_fireflies() {
        let summary = CellSummary {
            coord: CellCoord::new(1, 2),
            borders: Borders {
                left: 100.0,
                right: 200.0,
                bottom: 200.0,
                top: 300.0,
            },
            fireflies: vec![Firefly::new(FireflyId::new(4), 150.0, 250.0, 0, 10, 10)],
        };
        let text = summary.to_string();
        assert!(text.starts_with("[  1,  2]:    1 @"));
        assert!(text.contains("\n\tF:    4:"));
    }
}
