//! Cell actors, blink propagation, and world orchestration for the Cellfire
//! simulation.
//!
//! The world is a torus split into square cells. Every cell is a tokio task
//! that owns the fireflies inside it; the [`World`] drives all of them
//! through a Move phase, a migration step and a Blink phase on every tick.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `cellfire-config.yaml` into
//!   strongly-typed structs.
//! - [`clock`] -- Integer logical clock in microseconds.
//! - [`geometry`] -- Torus extent, cell lookup and neighbor wrapping.
//! - [`trig`] -- Precomputed cosine/sine table for whole degrees.
//! - [`firefly`] -- The oscillator: movement, firing and nudging.
//! - [`migration`] -- Ownership transfer messages between cells.
//! - [`countdown`] -- Phase barrier counters.
//! - [`blink`] -- Blink queues and the quiescence vote.
//! - [`cell`] -- The per-cell actor.
//! - [`world`] -- Grid construction and the tick sequence.
//! - [`runner`] -- Bounded simulation loop.

pub mod blink;
pub mod cell;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod firefly;
pub mod geometry;
mod grid;
pub mod migration;
pub mod runner;
pub mod trig;
pub mod world;

pub use config::SimulationConfig;
pub use firefly::Firefly;
pub use grid::Tunables;
pub use world::{TickSummary, World, WorldError};
