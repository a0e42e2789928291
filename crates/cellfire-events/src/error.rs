//! Error types for the `cellfire-events` crate.

/// Errors that can occur while writing or replaying a blink log.
#[derive(Debug, thiserror::Error)]
pub enum BlinkLogError {
    /// Reading or writing the underlying file failed.
    #[error("blink log I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A field of a record is not a valid integer.
    #[error("blink log line {line}: invalid {field} `{value}`")]
    Parse {
        /// One-based line number of the offending record.
        line: usize,
        /// Name of the column that failed to parse.
        field: &'static str,
        /// The raw text found in that column.
        value: String,
    },
}
