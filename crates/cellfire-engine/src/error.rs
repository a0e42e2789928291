//! Error types for the Cellfire engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup, the run itself, and sink shutdown.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: cellfire_core::config::ConfigError,
    },

    /// World construction or hatching failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: cellfire_core::WorldError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: cellfire_core::runner::RunnerError,
    },

    /// A blink consumer failed to write its output.
    #[error("blink output error: {source}")]
    BlinkLog {
        /// The underlying log error.
        #[from]
        source: cellfire_events::BlinkLogError,
    },

    /// A consumer task panicked or was cancelled.
    #[error("{task} task failed: {source}")]
    Task {
        /// Which consumer the task was running.
        task: &'static str,
        /// The underlying join error.
        source: tokio::task::JoinError,
    },
}
