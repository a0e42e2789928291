//! Rate-limited progress indicator.
//!
//! Prints one `.` for every `every` blinks and starts a new line whenever
//! the simulated second changes, so a synchronized swarm shows up as bursts
//! of dots on the same line.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::BlinkLogError;
use crate::record::BlinkRecord;

/// Drain `rx`, writing progress characters to `out`, until every sender is
/// dropped. Returns the number of records seen.
///
/// An `every` of zero is treated as one.
///
/// # Errors
///
/// Returns [`BlinkLogError::Io`] if writing to `out` fails.
pub async fn print_progress<W>(
    mut rx: mpsc::UnboundedReceiver<BlinkRecord>,
    mut out: W,
    every: u32,
) -> Result<u64, BlinkLogError>
where
    W: AsyncWrite + Unpin,
{
    let every = every.max(1);
    let mut seen: u64 = 0;
    let mut since_dot: u32 = 0;
    let mut last_second: Option<u32> = None;

    while let Some(record) = rx.recv().await {
        seen = seen.saturating_add(1);

        if last_second.is_some_and(|s| s != record.second) {
            out.write_all(b"\n").await?;
        }
        last_second = Some(record.second);

        since_dot = since_dot.saturating_add(1);
        if since_dot >= every {
            since_dot = 0;
            out.write_all(b".").await?;
            out.flush().await?;
        }
    }

    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(seen)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cellfire_types::FireflyId;

    use super::*;
    use crate::sink::{BlinkSink, ChannelSink};

    #[tokio::test]
    async fn one_dot_per_batch_and_newline_per_second() {
        let (sink, rx) = ChannelSink::new();
        for id in 0..20 {
            sink.record(BlinkRecord::at(FireflyId::new(id), 1_000_000));
        }
        for id in 0..10 {
            sink.record(BlinkRecord::at(FireflyId::new(id), 2_000_000));
        }
        drop(sink);

        let mut out: Vec<u8> = Vec::new();
        let seen = print_progress(rx, &mut out, 10).await.unwrap();

        assert_eq!(seen, 30);
        assert_eq!(String::from_utf8(out).unwrap(), "..\n.\n");
    }
}
