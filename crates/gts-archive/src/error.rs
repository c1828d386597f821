//! Error types for archive operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while archiving.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive range could not be determined from the store
    #[error("cannot determine archive range: {0}")]
    Discovery(String),

    /// File open/create/read/write/rename failure
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parquet encode/decode failure
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow batch construction or decode failure
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Store query or row scan failure
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Row data that cannot be mapped onto a vehicle position
    #[error("malformed row: {0}")]
    Decode(String),

    /// Timestamp or partition arithmetic failure
    #[error(transparent)]
    Record(#[from] gts_common::Error),

    /// Expected and actual row counts disagree; the output cannot be trusted
    #[error("{context}: expected {expected} rows, wrote {actual}")]
    RowCountMismatch {
        context: String,
        expected: u64,
        actual: u64,
    },
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Coarse classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Discovery,
    Io,
    Codec,
    Invariant,
}

impl ArchiveError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> ArchiveError + '_ {
        move |source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchiveError::Discovery(_) => ErrorKind::Discovery,
            ArchiveError::Io { .. } => ErrorKind::Io,
            ArchiveError::Parquet(_)
            | ArchiveError::Arrow(_)
            | ArchiveError::Store(_)
            | ArchiveError::Decode(_)
            | ArchiveError::Record(_) => ErrorKind::Codec,
            ArchiveError::RowCountMismatch { .. } => ErrorKind::Invariant,
        }
    }

    /// Invariant violations indicate a defect rather than an environmental failure.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }

    /// Returns the error code for this error type.
    pub fn code(&self) -> u32 {
        match self {
            ArchiveError::Discovery(_) => 20,
            ArchiveError::Io { .. } => 60,
            ArchiveError::Parquet(_) => 61,
            ArchiveError::Arrow(_) => 62,
            ArchiveError::Store(_) => 63,
            ArchiveError::Decode(_) => 64,
            ArchiveError::Record(_) => 65,
            ArchiveError::RowCountMismatch { .. } => 90,
        }
    }
}
