//! Destinations for blink records.
//!
//! Cell workers call [`BlinkSink::record`] from inside the blink protocol,
//! so an implementation must never block. [`ChannelSink`] forwards into an
//! unbounded channel whose receiver is drained by a consumer task such as
//! [`crate::log::write_blink_log`] or [`crate::progress::print_progress`].

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::record::BlinkRecord;

/// Receives one record per firing.
pub trait BlinkSink: Send + Sync {
    /// Hand off a record. Must return without waiting on the consumer.
    fn record(&self, record: BlinkRecord);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl BlinkSink for NullSink {
    fn record(&self, _record: BlinkRecord) {}
}

/// Forwards records into an unbounded channel.
///
/// Once the receiving side is gone records are silently dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BlinkRecord>,
}

impl ChannelSink {
    /// Create a sink and the receiver that a consumer task should drain.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BlinkRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BlinkSink for ChannelSink {
    fn record(&self, record: BlinkRecord) {
        // A closed receiver only means nobody is listening anymore.
        let _ = self.tx.send(record);
    }
}

/// Duplicates every record into several sinks.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn BlinkSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a destination.
    pub fn push(&mut self, sink: Arc<dyn BlinkSink>) {
        self.sinks.push(sink);
    }

    /// Number of destinations.
    pub const fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no destinations at all.
    pub const fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl BlinkSink for FanoutSink {
    fn record(&self, record: BlinkRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}

impl core::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}
