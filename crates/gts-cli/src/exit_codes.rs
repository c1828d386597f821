//! Exit codes for the gtfs-scraper CLI.
//!
//! Exit codes communicate the outcome of a run without requiring output
//! parsing. Values are stable.

use gts_archive::{ArchiveError, ErrorKind};
use gts_config::ConfigError;

/// Exit codes for gtfs-scraper operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed (including "nothing to archive")
    Clean = 0,

    /// Configuration missing, unreadable or invalid
    ConfigError = 10,

    /// Archive range could not be determined
    DiscoveryError = 11,

    /// Store, Parquet or Arrow encode/decode failure
    CodecError = 12,

    /// I/O error
    IoError = 13,

    /// Internal invariant violated; archive output cannot be trusted
    InternalError = 99,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Check if this exit code indicates an error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&ArchiveError> for ExitCode {
    fn from(err: &ArchiveError) -> Self {
        match err.kind() {
            ErrorKind::Discovery => ExitCode::DiscoveryError,
            ErrorKind::Io => ExitCode::IoError,
            ErrorKind::Codec => ExitCode::CodecError,
            ErrorKind::Invariant => ExitCode::InternalError,
        }
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        ExitCode::ConfigError
    }
}
