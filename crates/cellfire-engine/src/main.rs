//! Simulation binary for the Cellfire firefly swarm.
//!
//! Loads configuration, wires the blink consumers, hatches the swarm and
//! runs the tick loop for the configured number of ticks.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `CELLFIRE_CONFIG` or `cellfire-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Spawn the blink consumers (blink log, progress dots)
//! 4. Create the world and hatch the swarm
//! 5. Run the simulation loop
//! 6. Shut the cells down, drain the consumers, log the result

mod error;
mod tick_log;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cellfire_core::World;
use cellfire_core::config::{LoggingConfig, OutputConfig, SimulationConfig};
use cellfire_core::runner;
use cellfire_events::log::create_blink_log;
use cellfire_events::progress::print_progress;
use cellfire_events::{BlinkLogError, BlinkSink, ChannelSink, FanoutSink};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::tick_log::TickLogger;

/// Config file used when `CELLFIRE_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "cellfire-config.yaml";

/// Environment variable naming an alternative config file.
const CONFIG_ENV: &str = "CELLFIRE_CONFIG";

/// A running blink consumer.
struct Consumer {
    name: &'static str,
    handle: JoinHandle<Result<u64, BlinkLogError>>,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging depends on it, so report afterwards.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("cellfire-engine starting");
    let source = source.map_or_else(
        || "built-in defaults".to_owned(),
        |path| path.display().to_string(),
    );
    info!(source = %source, "Configuration loaded");
    info!(
        columns = config.world.columns,
        rows = config.world.rows,
        cell_size = config.world.cell_size,
        seed = config.world.seed,
        fireflies = config.swarm.fireflies,
        tick_len_us = config.time.tick_len_us,
        max_ticks = config.run.max_ticks,
        "Simulation parameters"
    );

    // 3. Blink consumers.
    let (sink, consumers) = spawn_consumers(&config.output);

    // 4. World and swarm.
    let mut world = World::new(&config, sink)?;
    let hatched = world.hatch_fireflies(config.swarm.fireflies).await?;
    info!(hatched = hatched.len(), "Swarm hatched");

    // 5. Run.
    let mut callback = TickLogger::new(config.time.tick_len_us);
    let outcome = runner::run_simulation(&mut world, config.run.max_ticks, &mut callback).await;

    // 6. Shut down. The world holds the last sink handles, so the consumers
    //    only see end-of-stream once every cell is gone.
    world.shutdown().await;
    let drained = drain_consumers(consumers).await;

    let result = outcome?;
    runner::log_simulation_end(&result);
    drained?;

    info!(
        total_ticks = result.total_ticks,
        total_blinks = result.total_blinks,
        "cellfire-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration.
///
/// Reads the file named by `CELLFIRE_CONFIG` if set, which must exist.
/// Otherwise looks for `cellfire-config.yaml` in the working directory and
/// falls back to defaults when it is absent. Returns the path actually read.
fn load_config() -> Result<(SimulationConfig, Option<PathBuf>), EngineError> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        let path = PathBuf::from(path);
        let config = SimulationConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let path = Path::new(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, Some(path.to_path_buf())))
    } else {
        Ok((SimulationConfig::default(), None))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to
/// stderr so progress output on stdout stays readable.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Spawn one consumer task per configured output and return the sink that
/// feeds all of them.
fn spawn_consumers(output: &OutputConfig) -> (Arc<dyn BlinkSink>, Vec<Consumer>) {
    let mut fanout = FanoutSink::new();
    let mut consumers = Vec::new();

    if let Some(path) = output.blink_log.clone() {
        let (sink, rx) = ChannelSink::new();
        fanout.push(Arc::new(sink));
        let flush_every = Duration::from_millis(output.flush_interval_ms);
        consumers.push(Consumer {
            name: "blink log",
            handle: tokio::spawn(async move {
                create_blink_log(Path::new(&path), rx, flush_every).await
            }),
        });
    }

    if output.progress_every > 0 {
        let (sink, rx) = ChannelSink::new();
        fanout.push(Arc::new(sink));
        let every = output.progress_every;
        consumers.push(Consumer {
            name: "progress",
            handle: tokio::spawn(async move { print_progress(rx, tokio::io::stdout(), every).await }),
        });
    }

    info!(consumers = fanout.len(), "Blink consumers started");
    (Arc::new(fanout), consumers)
}

/// Wait for every consumer to reach end-of-stream.
///
/// All consumers are awaited even if one fails; the first failure is
/// returned.
async fn drain_consumers(consumers: Vec<Consumer>) -> Result<(), EngineError> {
    let mut first_error = None;
    for consumer in consumers {
        let outcome = match consumer.handle.await {
            Ok(Ok(records)) => {
                info!(consumer = consumer.name, records, "Blink consumer finished");
                continue;
            }
            Ok(Err(source)) => EngineError::from(source),
            Err(source) => EngineError::Task {
                task: consumer.name,
                source,
            },
        };
        warn!(consumer = consumer.name, error = %outcome, "Blink consumer failed");
        first_error.get_or_insert(outcome);
    }
    first_error.map_or(Ok(()), Err)
}
