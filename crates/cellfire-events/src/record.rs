//! The blink record emitted on every firing.
//!
//! The log does not carry minutes: only the second within the minute and the
//! millisecond within the second. Readers rebuild minutes from `59 -> 0`
//! transitions (see [`crate::replay`]).

use cellfire_types::FireflyId;

/// Microseconds in one simulated second.
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Microseconds in one simulated millisecond.
pub const MICROS_PER_MILLI: u64 = 1_000;

/// One firing of one firefly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlinkRecord {
    /// The firefly that fired.
    pub firefly: FireflyId,
    /// Simulated whole second within the current minute, `0..60`.
    pub second: u32,
    /// Simulated millisecond within the current second, `0..1000`.
    pub millisecond: u32,
}

impl BlinkRecord {
    /// Build the record for a firing that happened at logical time `clock`
    /// (in microseconds).
    #[allow(clippy::cast_possible_truncation)]
    pub const fn at(firefly: FireflyId, clock: u64) -> Self {
        let second = (clock / MICROS_PER_SECOND) % 60;
        let millisecond = (clock / MICROS_PER_MILLI) % 1_000;
        Self {
            firefly,
            second: second as u32,
            millisecond: millisecond as u32,
        }
    }

    /// Render the record as one log line, including the trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl core::fmt::Display for BlinkRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{},{}", self.firefly, self.second, self.millisecond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_clock_into_second_and_millisecond() {
        let rec = BlinkRecord::at(FireflyId::new(3), 2_345_678);
        assert_eq!(rec.second, 2);
        assert_eq!(rec.millisecond, 345);
    }

    #[test]
    fn seconds_wrap_every_minute() {
        let rec = BlinkRecord::at(FireflyId::new(0), 61 * MICROS_PER_SECOND + 5_000);
        assert_eq!(rec.second, 1);
        assert_eq!(rec.millisecond, 5);
    }

    #[test]
    fn line_form_has_no_spaces() {
        let rec = BlinkRecord::at(FireflyId::new(12), 59_999_000);
        assert_eq!(rec.to_line(), "12,59,999\n");
    }
}
