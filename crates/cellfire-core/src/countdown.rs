//! Phase barrier counter.
//!
//! A `Countdown` is set to the number of participants at the start of a
//! phase. Each participant calls [`Countdown::done`] when it has nothing left
//! to do and may call [`Countdown::add`] to take back a vote. The coordinator
//! awaits [`Countdown::wait`], which returns once the count is zero.
//!
//! Decrementing below zero is a protocol defect. It is reported as an error
//! rather than wrapping, and the counter stays at zero.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Notify;

/// Errors raised by a [`Countdown`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CountdownError {
    /// `done` was called more often than participants were registered.
    #[error("countdown {name} decremented below zero")]
    Underflow {
        /// Which counter underflowed.
        name: &'static str,
    },
}

/// Counter that wakes a waiter when it reaches zero.
#[derive(Debug)]
pub struct Countdown {
    name: &'static str,
    pending: AtomicU64,
    zero: Notify,
}

impl Countdown {
    /// Create a counter at zero.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: AtomicU64::new(0),
            zero: Notify::new(),
        }
    }

    /// Name used in errors and logs.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Start a new phase with `participants` outstanding votes.
    pub fn reset(&self, participants: u64) {
        self.pending.store(participants, Ordering::Release);
        if participants == 0 {
            self.zero.notify_waiters();
        }
    }

    /// Register `n` more outstanding votes.
    pub fn add(&self, n: u64) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    /// Withdraw one outstanding vote. Returns the remaining count.
    ///
    /// # Errors
    ///
    /// Returns [`CountdownError::Underflow`] if the counter was already zero.
    pub fn done(&self) -> Result<u64, CountdownError> {
        let previous = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map_err(|_zero| CountdownError::Underflow { name: self.name })?;
        let remaining = previous.saturating_sub(1);
        if remaining == 0 {
            self.zero.notify_waiters();
        }
        Ok(remaining)
    }

    /// Current number of outstanding votes.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until the counter is zero.
    pub async fn wait(&self) {
        loop {
            let notified = self.zero.notified();
            tokio::pin!(notified);
            // Register before checking so a wake between the two is not lost.
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}
