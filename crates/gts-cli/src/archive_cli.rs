//! `archive` subcommand.

use std::io;
use std::path::{Path, PathBuf};

use clap::Args;
use gts_archive::{archive_partitions, ArchiveError, MergeOptions, PositionStore, QueryWindow};
use gts_config::{load_config, ConfigError};
use tracing::error;

use crate::exit_codes::ExitCode;
use crate::output::{write_summary, OutputFormat};

/// Arguments for the archive command
#[derive(Args, Debug, Default)]
pub struct ArchiveArgs {
    /// Realtime SQLite store [default: <DataDir>/realtime.db]
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Archive root directory [default: <DataDir>/archive]
    #[arg(long, value_name = "PATH")]
    pub archive_dir: Option<PathBuf>,

    /// Rescan every month from its first day instead of the oldest watermark
    #[arg(long)]
    pub full_rescan: bool,

    /// Rows per Parquet row group
    #[arg(long, value_name = "N", value_parser = parse_row_group_size)]
    pub row_group_size: Option<usize>,
}

fn parse_row_group_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Paths and options for one archive run after merging flags with config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub db: PathBuf,
    pub archive_dir: PathBuf,
    pub options: MergeOptions,
}

/// Combine flags with the config file. The config is only required when a
/// path flag is missing or `--config` was given explicitly.
pub fn plan_archive(config_path: Option<&Path>, args: &ArchiveArgs) -> Result<ArchivePlan, ConfigError> {
    let needs_config = config_path.is_some() || args.db.is_none() || args.archive_dir.is_none();
    let config = if needs_config {
        Some(load_config(config_path)?)
    } else {
        None
    };

    let (db, archive_dir) = match &config {
        Some(config) => (
            args.db.clone().unwrap_or_else(|| config.store_path()),
            args.archive_dir.clone().unwrap_or_else(|| config.archive_dir()),
        ),
        None => match (&args.db, &args.archive_dir) {
            (Some(db), Some(dir)) => (db.clone(), dir.clone()),
            _ => {
                return Err(ConfigError::Invalid(
                    "--db and --archive-dir are required without a config file".to_string(),
                ))
            }
        },
    };

    let settings = config.map(|c| c.archive).unwrap_or_default();
    let full_rescan = args.full_rescan || settings.full_rescan;
    let row_group_size = args.row_group_size.unwrap_or(settings.row_group_size);

    Ok(ArchivePlan {
        db,
        archive_dir,
        options: MergeOptions {
            window: if full_rescan {
                QueryWindow::PeriodStart
            } else {
                QueryWindow::MinWatermark
            },
            row_group_size,
            ..MergeOptions::default()
        },
    })
}

/// Run the archive command.
pub fn run_archive(config_path: Option<&Path>, format: OutputFormat, args: &ArchiveArgs) -> ExitCode {
    let plan = match plan_archive(config_path, args) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(&e);
        }
    };

    let result = PositionStore::open_read_only(&plan.db)
        .and_then(|store| archive_partitions(&store, &plan.archive_dir, &plan.options));
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => return report_failure(&e),
    };

    let stdout = io::stdout();
    if let Err(e) = write_summary(&mut stdout.lock(), format, &plan.archive_dir, &summary) {
        eprintln!("Error: failed to write summary: {e}");
        return ExitCode::IoError;
    }
    ExitCode::Clean
}

fn report_failure(err: &ArchiveError) -> ExitCode {
    let code = ExitCode::from(err);
    error!(code = err.code(), fatal = err.is_fatal(), error = %err, "archive failed");
    if err.is_fatal() {
        eprintln!("Internal error: {err}");
    } else {
        eprintln!("Error: {err}");
    }
    code
}
