//! Blink propagation queues and the quiescence vote.
//!
//! Every cell owns one [`BlinkInbox`]. During a Blink phase the cell pushes
//! its own firings into it, neighbors push firings that happened close to a
//! shared edge, and the cell worker drains it, nudging its fireflies.
//!
//! The world knows the phase is over when the quiescence countdown reaches
//! zero. The countdown always equals the number of cells whose idle flag is
//! false:
//!
//! - a cell sets its flag (and counts down) only while holding its own idle
//!   lock and seeing nothing queued;
//! - a sender that finds the receiver idle clears the flag and counts up
//!   while holding the receiver's lock, and enqueues before releasing it.
//!
//! So a vote can never be observed while a signal is in flight towards the
//! voter, and the count cannot go negative.

use std::sync::atomic::{AtomicUsize, Ordering};

use cellfire_types::{CellCoord, FireflyId};
use tokio::sync::{Mutex, mpsc};
use tracing::error;

use crate::countdown::{Countdown, CountdownError};
use crate::world::WorldError;

/// A firing as seen by the cells that must react to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkSignal {
    /// The firefly that fired.
    pub firefly: FireflyId,
    /// Its horizontal position when it fired.
    pub x: f32,
    /// Its vertical position when it fired.
    pub y: f32,
}

impl BlinkSignal {
    /// Position as a pair.
    pub const fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Inbound side of one cell's blink queue, shared by all senders.
#[derive(Debug)]
pub struct BlinkInbox {
    coord: CellCoord,
    idle: Mutex<bool>,
    tx: mpsc::UnboundedSender<BlinkSignal>,
    queued: AtomicUsize,
}

impl BlinkInbox {
    /// Create the inbox of `coord` and the receiver its worker drains.
    ///
    /// A new inbox starts idle, like a cell between two ticks.
    pub fn new(coord: CellCoord) -> (Self, mpsc::UnboundedReceiver<BlinkSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbox = Self {
            coord,
            idle: Mutex::new(true),
            tx,
            queued: AtomicUsize::new(0),
        };
        (inbox, rx)
    }

    /// The cell this inbox belongs to.
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Enqueue a signal, reviving the cell's vote if it had gone idle.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::WorkerGone`] if the cell worker has stopped.
    pub async fn deliver(
        &self,
        signal: BlinkSignal,
        quiescence: &Countdown,
    ) -> Result<(), WorldError> {
        let mut idle = self.idle.lock().await;
        let revived = *idle;
        if revived {
            quiescence.add(1);
            *idle = false;
        }
        self.queued.fetch_add(1, Ordering::AcqRel);

        if self.tx.send(signal).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            if revived {
                *idle = true;
                quiescence.done()?;
            }
            return Err(WorldError::WorkerGone { cell: self.coord });
        }
        Ok(())
    }

    /// Record that the worker pulled one signal off the queue.
    ///
    /// Returns `false`, and logs the defect, if the queued count was already
    /// zero; the count is left at zero.
    pub fn taken(&self) -> bool {
        let counted = self
            .queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !counted {
            error!(cell = %self.coord, "Blink taken from a queue counted as empty");
        }
        counted
    }

    /// Vote the cell idle if nothing is queued and it has not voted yet.
    ///
    /// Returns whether a vote was cast.
    ///
    /// # Errors
    ///
    /// Returns [`CountdownError::Underflow`] if the countdown was already
    /// zero, which means some vote was counted twice.
    pub async fn vote_idle(&self, quiescence: &Countdown) -> Result<bool, CountdownError> {
        let mut idle = self.idle.lock().await;
        if *idle || self.queued() > 0 {
            return Ok(false);
        }
        *idle = true;
        quiescence.done()?;
        Ok(true)
    }

    /// Mark the cell busy at the start of a Blink phase.
    pub async fn wake(&self) {
        *self.idle.lock().await = false;
    }

    /// Whether the cell has voted idle.
    pub async fn is_idle(&self) -> bool {
        *self.idle.lock().await
    }

    /// Signals sent but not yet taken by the worker.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }
}
