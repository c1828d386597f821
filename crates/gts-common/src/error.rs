//! Error types shared by the GTFS scraper crates.

use thiserror::Error;

/// Result type alias for common operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared record and partition types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid partition key '{0}': expected YYYY-MM")]
    InvalidPartition(String),

    #[error("month {month} is out of range for {year}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("timestamp {0} is outside the representable calendar range")]
    TimestampOutOfRange(i64),
}
