//! Shared type definitions for the Cellfire simulation.
//!
//! Every crate in the workspace names fireflies, cells and directions through
//! the types defined here, so the blink log, the cell actors and the world
//! all agree on one vocabulary.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed integer identifiers for fireflies
//! - [`enums`] -- Compass directions between neighboring cells
//! - [`structs`] -- Grid coordinates of a cell

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::Direction;
pub use ids::FireflyId;
pub use structs::CellCoord;
