//! gtfs-scraper command line front end.
//!
//! The binary in `main.rs` only parses arguments and dispatches; command
//! logic lives here so it can be tested directly.

pub mod archive_cli;
pub mod exit_codes;
pub mod logging;
pub mod output;

pub use archive_cli::{plan_archive, run_archive, ArchiveArgs, ArchivePlan};
pub use exit_codes::ExitCode;
pub use logging::LogFormat;
pub use output::OutputFormat;
