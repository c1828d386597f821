//! gtfs-scraper binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gts_cli::{logging, run_archive, ArchiveArgs, LogFormat, OutputFormat};

/// GTFS-realtime scraper tools
#[derive(Parser, Debug)]
#[command(name = "gtfs-scraper", version, about)]
struct Cli {
    /// Config file [default: $GTFS_SCRAPER_CONFIG, then ./gtfs-scraper.json]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Summary format on stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge new vehicle positions from the store into monthly Parquet partitions
    Archive(ArchiveArgs),
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format, cli.verbose);

    let code = match &cli.command {
        Commands::Archive(args) => run_archive(cli.config.as_deref(), cli.format, args),
    };
    std::process::exit(code.as_i32());
}
