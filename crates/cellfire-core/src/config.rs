//! Configuration loading and typed config structures for the Cellfire
//! simulation.
//!
//! The canonical configuration lives in `cellfire-config.yaml` at the project
//! root. This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file. Every
//! field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! All times are logical microseconds; all distances are world units.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an impossible world.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `cellfire-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Grid shape and random seed.
    #[serde(default)]
    pub world: WorldConfig,

    /// Hatching and movement parameters.
    #[serde(default)]
    pub swarm: SwarmConfig,

    /// Blink coupling between fireflies.
    #[serde(default)]
    pub coupling: CouplingConfig,

    /// Logical clock settings.
    #[serde(default)]
    pub time: TimeConfig,

    /// Run length.
    #[serde(default)]
    pub run: RunConfig,

    /// Where blink records go.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values fail [`validate`](Self::validate).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if the values fail [`validate`](Self::validate).
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.world.columns == 0 || self.world.rows == 0 {
            return invalid("world.columns and world.rows must be at least 1");
        }
        if !(self.world.cell_size.is_finite() && self.world.cell_size > 0.0) {
            return invalid("world.cell_size must be a positive number");
        }
        if self.swarm.period_min_us == 0 {
            return invalid("swarm.period_min_us must be at least 1");
        }
        if self.swarm.period_min_us > self.swarm.period_max_us {
            return invalid("swarm.period_min_us must not exceed swarm.period_max_us");
        }
        if self.swarm.first_blink_min_us > self.swarm.period_min_us {
            return invalid("swarm.first_blink_min_us must not exceed swarm.period_min_us");
        }
        if !self.swarm.step_length.is_finite() || self.swarm.step_length < 0.0 {
            return invalid("swarm.step_length must be a non-negative number");
        }
        if self.swarm.turn_jitter_degrees > 180 {
            return invalid("swarm.turn_jitter_degrees must be at most 180");
        }
        if !self.coupling.nudge_radius.is_finite() || self.coupling.nudge_radius < 0.0 {
            return invalid("coupling.nudge_radius must be a non-negative number");
        }
        if self
            .coupling
            .border_distance
            .is_some_and(|border| !border.is_finite() || border < 0.0)
        {
            return invalid("coupling.border_distance must be a non-negative number");
        }
        if self.time.tick_len_us == 0 {
            return invalid("time.tick_len_us must be at least 1");
        }
        Ok(())
    }
}

/// Grid shape and seed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Number of cell columns.
    #[serde(default = "default_columns")]
    pub columns: u32,

    /// Number of cell rows.
    #[serde(default = "default_rows")]
    pub rows: u32,

    /// Side length of one square cell.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,

    /// Random seed for hatching and orientation jitter.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            rows: default_rows(),
            cell_size: default_cell_size(),
            seed: default_seed(),
        }
    }
}

/// Hatching and movement parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwarmConfig {
    /// Number of fireflies hatched by the engine.
    #[serde(default = "default_fireflies")]
    pub fireflies: u32,

    /// Shortest blink period a firefly can be hatched with.
    #[serde(default = "default_period_min_us")]
    pub period_min_us: u64,

    /// Longest blink period a firefly can be hatched with.
    #[serde(default = "default_period_max_us")]
    pub period_max_us: u64,

    /// Earliest first blink after hatching. The latest is one period.
    #[serde(default = "default_first_blink_min_us")]
    pub first_blink_min_us: u64,

    /// Distance covered by one Move.
    #[serde(default = "default_step_length")]
    pub step_length: f32,

    /// Maximum random orientation change per Move, in degrees.
    #[serde(default = "default_turn_jitter_degrees")]
    pub turn_jitter_degrees: u16,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            fireflies: default_fireflies(),
            period_min_us: default_period_min_us(),
            period_max_us: default_period_max_us(),
            first_blink_min_us: default_first_blink_min_us(),
            step_length: default_step_length(),
            turn_jitter_degrees: default_turn_jitter_degrees(),
        }
    }
}

/// How a blink influences the fireflies around it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CouplingConfig {
    /// How far a blink pulls a neighbor's deadline earlier.
    #[serde(default = "default_nudge_amount_us")]
    pub nudge_amount_us: u64,

    /// Fireflies closer than this (toroidal Manhattan distance) get nudged.
    #[serde(default = "default_nudge_radius")]
    pub nudge_radius: f32,

    /// Distance from a cell edge under which a blink is also sent to the
    /// neighbor across that edge. Defaults to half the nudge radius.
    #[serde(default)]
    pub border_distance: Option<f32>,
}

impl CouplingConfig {
    /// The effective border-proximity threshold.
    pub fn border_distance(&self) -> f32 {
        self.border_distance.unwrap_or(self.nudge_radius / 2.0)
    }
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            nudge_amount_us: default_nudge_amount_us(),
            nudge_radius: default_nudge_radius(),
            border_distance: None,
        }
    }
}

/// Logical clock settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimeConfig {
    /// Logical microseconds added to the clock by each tick.
    #[serde(default = "default_tick_len_us")]
    pub tick_len_us: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            tick_len_us: default_tick_len_us(),
        }
    }
}

/// Run length.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Number of ticks the engine executes before stopping.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
        }
    }
}

/// Where blink records go.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Path of the `id,second,millisecond` blink log. `None` disables it.
    #[serde(default)]
    pub blink_log: Option<String>,

    /// Print one progress dot per this many blinks. `0` disables the dots.
    #[serde(default = "default_progress_every")]
    pub progress_every: u32,

    /// Flush period of the blink log writer, in wall-clock milliseconds.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            blink_log: None,
            progress_every: default_progress_every(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is
    /// not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_columns() -> u32 {
    16
}

const fn default_rows() -> u32 {
    16
}

const fn default_cell_size() -> f32 {
    200.0
}

const fn default_seed() -> u64 {
    42
}

const fn default_fireflies() -> u32 {
    50_000
}

const fn default_period_min_us() -> u64 {
    900_000
}

const fn default_period_max_us() -> u64 {
    1_100_000
}

const fn default_first_blink_min_us() -> u64 {
    1_000
}

const fn default_step_length() -> f32 {
    1.0
}

const fn default_turn_jitter_degrees() -> u16 {
    1
}

const fn default_nudge_amount_us() -> u64 {
    50_000
}

const fn default_nudge_radius() -> f32 {
    100.0
}

const fn default_tick_len_us() -> u64 {
    25_000
}

const fn default_max_ticks() -> u64 {
    400
}

const fn default_progress_every() -> u32 {
    10
}

const fn default_flush_interval_ms() -> u64 {
    5_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
