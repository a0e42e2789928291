//! Blink records and their consumers for the Cellfire simulation.
//!
//! Every time a firefly fires, the cell that owns it hands one
//! [`BlinkRecord`] to a [`BlinkSink`]. The simulation core never waits on a
//! sink: records are pushed into unbounded channels and drained by consumer
//! tasks that either print progress dots or append to a blink log.
//!
//! # Modules
//!
//! - [`error`] -- Error types for writing and replaying blink logs.
//! - [`record`] -- The [`BlinkRecord`] value and its `id,second,millisecond`
//!   text form.
//! - [`sink`] -- The [`BlinkSink`] trait with channel, fan-out and no-op
//!   implementations.
//! - [`log`] -- Buffered blink log writer task.
//! - [`progress`] -- Rate-limited single-character progress indicator.
//! - [`replay`] -- Reads a blink log back, rebuilding minute rollovers.

pub mod error;
pub mod log;
pub mod progress;
pub mod record;
pub mod replay;
pub mod sink;

pub use error::BlinkLogError;
pub use record::BlinkRecord;
pub use replay::{BlinkTime, read_blink_log};
pub use sink::{BlinkSink, ChannelSink, FanoutSink, NullSink};
