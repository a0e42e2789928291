//! Bounded simulation loop.
//!
//! [`run_simulation`] drives [`World::step`] for a fixed number of ticks and
//! reports every tick to a [`TickCallback`]. There is no pacing: ticks run
//! back to back on logical time.

use tracing::info;

use crate::world::{TickSummary, World, WorldError};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}

/// Result of the simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// The last tick summary, if any tick ran.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
    /// Firings over the whole run.
    pub total_blinks: u64,
    /// Cell changes over the whole run.
    pub total_migrations: u64,
}

/// Callback invoked after each tick completes.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary) {}
}

/// Run `max_ticks` ticks.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails. Ticks that completed before the
/// failure are lost from the result but their blinks have already been
/// handed to the sink.
pub async fn run_simulation(
    world: &mut World,
    max_ticks: u64,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut result = SimulationResult {
        final_summary: None,
        total_ticks: 0,
        total_blinks: 0,
        total_migrations: 0,
    };

    info!(
        max_ticks,
        clock = world.clock().now(),
        "Simulation starting"
    );

    while result.total_ticks < max_ticks {
        let summary = world.step().await?;

        result.total_ticks = result.total_ticks.saturating_add(1);
        result.total_blinks = result.total_blinks.saturating_add(summary.blinks);
        let migrations = u64::try_from(summary.migrations).unwrap_or(u64::MAX);
        result.total_migrations = result.total_migrations.saturating_add(migrations);

        callback.on_tick(&summary);
        result.final_summary = Some(summary);
    }

    Ok(result)
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        total_ticks = result.total_ticks,
        total_blinks = result.total_blinks,
        total_migrations = result.total_migrations,
        final_clock = result.final_summary.as_ref().map(|s| s.clock),
        "Simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cellfire_events::NullSink;

    use super::*;
    use crate::config::SimulationConfig;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<u64>,
        clocks: Vec<u64>,
    }

    impl TickCallback for Recorder {
        fn on_tick(&mut self, summary: &TickSummary) {
            self.ticks.push(summary.tick);
            self.clocks.push(summary.clock);
        }
    }

    fn small_config() -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.world.columns = 3;
        config.world.rows = 3;
        config.world.cell_size = 50.0;
        config.swarm.fireflies = 30;
        config
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_exactly_max_ticks() {
        let config = small_config();
        let mut world = World::new(&config, Arc::new(NullSink)).unwrap();
        world.hatch_fireflies(config.swarm.fireflies).await.unwrap();

        let mut recorder = Recorder::default();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            run_simulation(&mut world, 5, &mut recorder),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(result.total_ticks, 5);
        assert_eq!(recorder.ticks, vec![1, 2, 3, 4, 5]);
        assert_eq!(recorder.clocks, vec![0, 25_000, 50_000, 75_000, 100_000]);
        assert_eq!(result.final_summary.map(|s| s.tick), Some(5));
        assert_eq!(result.total_blinks, world.total_blinks());
        assert_eq!(world.clock().now(), 125_000);
        world.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn zero_ticks_is_an_empty_run() {
        let mut world = World::new(&small_config(), Arc::new(NullSink)).unwrap();
        let result = run_simulation(&mut world, 0, &mut NoOpCallback).await.unwrap();
        assert_eq!(result.total_ticks, 0);
        assert!(result.final_summary.is_none());
        assert_eq!(world.clock().now(), 0);
        world.shutdown().await;
    }
}
