//! Tick callback that reports swarm activity once per simulated second.

use cellfire_core::TickSummary;
use cellfire_core::runner::TickCallback;
use tracing::info;

/// Microseconds in one simulated second.
const SECOND_US: u64 = 1_000_000;

/// Aggregates tick summaries and logs one line per simulated second.
#[derive(Debug)]
pub struct TickLogger {
    ticks_per_second: u64,
    blinks: u64,
    migrations: u64,
}

impl TickLogger {
    /// Create a logger for ticks of `tick_len_us` microseconds.
    ///
    /// Ticks longer than a second report on every tick.
    pub fn new(tick_len_us: u64) -> Self {
        let ticks_per_second = SECOND_US.checked_div(tick_len_us).unwrap_or(1).max(1);
        Self {
            ticks_per_second,
            blinks: 0,
            migrations: 0,
        }
    }

    /// Number of ticks aggregated into one report.
    pub const fn ticks_per_second(&self) -> u64 {
        self.ticks_per_second
    }

    /// Whether `summary` closes a reporting window.
    fn closes_window(&self, summary: &TickSummary) -> bool {
        summary
            .tick
            .checked_rem(self.ticks_per_second)
            .is_some_and(|r| r == 0)
    }
}

impl TickCallback for TickLogger {
    fn on_tick(&mut self, summary: &TickSummary) {
        self.blinks = self.blinks.saturating_add(summary.blinks);
        let migrations = u64::try_from(summary.migrations).unwrap_or(u64::MAX);
        self.migrations = self.migrations.saturating_add(migrations);

        if self.closes_window(summary) {
            info!(
                tick = summary.tick,
                second = summary.clock / SECOND_US,
                blinks = self.blinks,
                migrations = self.migrations,
                "Simulated second"
            );
            self.blinks = 0;
            self.migrations = 0;
        }
    }
}
