//! Logical simulation clock.
//!
//! Time is an integer count of logical microseconds. It starts at zero and
//! only moves when the world finishes a tick; nothing in the simulation ever
//! reads wall-clock time.
//!
//! All arithmetic is checked so a very long run fails loudly instead of
//! wrapping back to zero.

use crate::config::TimeConfig;

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Advancing would move the clock past `u64::MAX`.
    #[error("clock overflow: cannot advance {now}us by {tick_len}us")]
    TickOverflow {
        /// Clock value before the failed advance.
        now: u64,
        /// Tick length that could not be added.
        tick_len: u64,
    },

    /// A tick length of zero would freeze the simulation.
    #[error("invalid time configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// The world's logical clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimClock {
    /// Current time in logical microseconds.
    now: u64,

    /// Microseconds added by each tick.
    tick_len: u64,

    /// Number of completed ticks.
    tick: u64,
}

impl SimClock {
    /// Create a clock at time zero.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if the tick length is zero.
    pub fn new(config: &TimeConfig) -> Result<Self, ClockError> {
        Self::from_parts(0, config.tick_len_us, 0)
    }

    /// Create a clock at an arbitrary point (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `tick_len` is zero.
    pub fn from_parts(now: u64, tick_len: u64, tick: u64) -> Result<Self, ClockError> {
        if tick_len == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "tick_len_us must be at least 1".to_owned(),
            });
        }
        Ok(Self {
            now,
            tick_len,
            tick,
        })
    }

    /// Advance by one tick. Returns the new time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] if the time or the tick counter
    /// would exceed `u64::MAX`. The clock is left unchanged in that case.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        let overflow = || ClockError::TickOverflow {
            now: self.now,
            tick_len: self.tick_len,
        };
        let now = self.now.checked_add(self.tick_len).ok_or_else(overflow)?;
        let tick = self.tick.checked_add(1).ok_or_else(overflow)?;
        self.now = now;
        self.tick = tick;
        Ok(self.now)
    }

    /// Current time in logical microseconds.
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Microseconds per tick.
    pub const fn tick_len(&self) -> u64 {
        self.tick_len
    }

    /// Number of ticks completed so far.
    pub const fn tick(&self) -> u64 {
        self.tick
    }
}
