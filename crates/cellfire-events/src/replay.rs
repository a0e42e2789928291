//! Replaying a blink log.
//!
//! The log stores only the second within the minute, so absolute time is
//! rebuilt on the way in: seeing second `59` arms a rollover, and the next
//! record at second `0` advances the minute counter. Reading stops at the
//! first record that does not have three non-empty fields (a truncated tail
//! from an interrupted run).

use std::io::BufRead;

use cellfire_types::FireflyId;

use crate::error::BlinkLogError;

/// Milliseconds in one minute.
const MILLIS_PER_MINUTE: u64 = 60_000;

/// Milliseconds in one second.
const MILLIS_PER_SECOND: u64 = 1_000;

/// A firing placed on an absolute millisecond timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlinkTime {
    /// The firefly that fired.
    pub firefly: FireflyId,
    /// Milliseconds since the start of the log's first minute.
    pub millis: u64,
}

/// Streaming reader over a blink log.
#[derive(Debug)]
pub struct BlinkLogReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    minute: u64,
    rollover_armed: bool,
    finished: bool,
}

impl<R: BufRead> BlinkLogReader<R> {
    /// Wrap a buffered reader positioned at the start of a log.
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            minute: 0,
            rollover_armed: false,
            finished: false,
        }
    }

    fn parse_line(&mut self, line: &str) -> Option<Result<BlinkTime, BlinkLogError>> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [id, sec, milli] = fields.as_slice() else {
            return None;
        };
        if milli.is_empty() {
            return None;
        }

        let parsed = parse_field(self.line_no, "firefly id", id).and_then(|id| {
            let sec = parse_field(self.line_no, "second", sec)?;
            let milli = parse_field(self.line_no, "millisecond", milli)?;
            Ok((id, sec, milli))
        });
        let (id, sec, milli) = match parsed {
            Ok(values) => values,
            Err(e) => return Some(Err(e)),
        };

        if self.rollover_armed && sec == 0 {
            self.rollover_armed = false;
            self.minute = self.minute.saturating_add(1);
        }
        if !self.rollover_armed && sec == 59 {
            self.rollover_armed = true;
        }

        let millis = self
            .minute
            .saturating_mul(MILLIS_PER_MINUTE)
            .saturating_add(sec.saturating_mul(MILLIS_PER_SECOND))
            .saturating_add(milli);

        Some(Ok(BlinkTime {
            firefly: FireflyId::new(u32::try_from(id).unwrap_or(u32::MAX)),
            millis,
        }))
    }
}

impl<R: BufRead> Iterator for BlinkLogReader<R> {
    type Item = Result<BlinkTime, BlinkLogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(source) => {
                self.finished = true;
                return Some(Err(BlinkLogError::Io { source }));
            }
        };
        self.line_no = self.line_no.saturating_add(1);

        let item = self.parse_line(&line);
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// Read a whole blink log into memory.
///
/// # Errors
///
/// Returns [`BlinkLogError::Io`] on read failure and
/// [`BlinkLogError::Parse`] if a complete record holds a non-integer field.
pub fn read_blink_log<R: BufRead>(reader: R) -> Result<Vec<BlinkTime>, BlinkLogError> {
    BlinkLogReader::new(reader).collect()
}

fn parse_field(line: usize, field: &'static str, raw: &str) -> Result<u64, BlinkLogError> {
    raw.parse::<u64>().map_err(|_err| BlinkLogError::Parse {
        line,
        field,
        value: raw.to_owned(),
    })
}
