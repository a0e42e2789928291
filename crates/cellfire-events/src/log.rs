//! Buffered blink log writer.
//!
//! The log is line-oriented `firefly_id,second,millisecond` text with no
//! header row. The writer buffers aggressively and flushes on a timer so an
//! interrupted run still leaves most of its data on disk.

use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::error::BlinkLogError;
use crate::record::BlinkRecord;

/// Shortest accepted flush period.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Drain `rx` into `out` until every sender is dropped.
///
/// Returns the number of records written.
///
/// # Errors
///
/// Returns [`BlinkLogError::Io`] if writing or flushing fails.
pub async fn write_blink_log<W>(
    mut rx: mpsc::UnboundedReceiver<BlinkRecord>,
    out: W,
    flush_every: Duration,
) -> Result<u64, BlinkLogError>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(out);
    let mut ticker = tokio::time::interval(flush_every.max(MIN_FLUSH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    ticker.tick().await;

    let mut written: u64 = 0;
    loop {
        tokio::select! {
            maybe = rx.recv() => {
                let Some(record) = maybe else { break };
                writer.write_all(record.to_line().as_bytes()).await?;
                written = written.saturating_add(1);
            }
            _ = ticker.tick() => {
                writer.flush().await?;
                debug!(written, "Blink log flushed");
            }
        }
    }

    writer.flush().await?;
    Ok(written)
}

/// Create (or truncate) the file at `path` and run [`write_blink_log`] on it.
///
/// # Errors
///
/// Returns [`BlinkLogError::Io`] if the file cannot be created or written.
pub async fn create_blink_log(
    path: &Path,
    rx: mpsc::UnboundedReceiver<BlinkRecord>,
    flush_every: Duration,
) -> Result<u64, BlinkLogError> {
    let file = tokio::fs::File::create(path).await?;
    info!(path = %path.display(), "Blink log opened");
    let written = write_blink_log(rx, file, flush_every).await?;
    info!(path = %path.display(), written, "Blink log closed");
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cellfire_types::FireflyId;

    use super::*;
    use crate::sink::{BlinkSink, ChannelSink};

    #[tokio::test]
    async fn writes_one_line_per_record() {
        let (sink, rx) = ChannelSink::new();
        sink.record(BlinkRecord::at(FireflyId::new(0), 1_025_000));
        sink.record(BlinkRecord::at(FireflyId::new(14), 59_999_000));
        drop(sink);

        let mut out: Vec<u8> = Vec::new();
        let written = write_blink_log(rx, &mut out, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "0,1,25\n14,59,999\n");
    }

    #[tokio::test]
    async fn empty_log_is_empty() {
        let (sink, rx) = ChannelSink::new();
        drop(sink);
        let mut out: Vec<u8> = Vec::new();
        let written = write_blink_log(rx, &mut out, Duration::ZERO).await.unwrap();
        assert_eq!(written, 0);
        assert!(out.is_empty());
    }
}
