//! Scraper configuration types.
//!
//! Field names follow the keys of the existing `gtfs-scraper.json` files
//! (`DataDir`, `StaticURL`, ...), so deployed configs load unchanged.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Rows buffered per Parquet row group unless configured otherwise.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1_000_000;

const STORE_FILE: &str = "realtime.db";
const ARCHIVE_DIR: &str = "archive";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete scraper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Root directory for the realtime store, static downloads and archive.
    pub data_dir: PathBuf,

    #[serde(rename = "StaticURL", default)]
    pub static_url: String,

    #[serde(rename = "AlertsURL", default)]
    pub alerts_url: String,

    #[serde(rename = "TripUpdatesURL", default)]
    pub trip_updates_url: String,

    #[serde(rename = "VehicleUpdatesURL", default)]
    pub vehicle_updates_url: String,

    /// IANA zone used by the ingestor to interpret trip start dates.
    #[serde(default)]
    pub time_zone: String,

    #[serde(default)]
    pub archive: ArchiveSettings,
}

/// Tuning for the archive subcommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveSettings {
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,

    /// Rescan each month from its first instant instead of the oldest watermark.
    #[serde(default)]
    pub full_rescan: bool,
}

fn default_row_group_size() -> usize {
    DEFAULT_ROW_GROUP_SIZE
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            full_rescan: false,
        }
    }
}

impl Config {
    /// Minimal config rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            static_url: String::new(),
            alerts_url: String::new(),
            trip_updates_url: String::new(),
            vehicle_updates_url: String::new(),
            time_zone: String::new(),
            archive: ArchiveSettings::default(),
        }
    }

    /// Parse a config from JSON text and validate it.
    pub fn from_json(json: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("DataDir must not be empty".to_string()));
        }
        if self.archive.row_group_size == 0 {
            return Err(ConfigError::Invalid(
                "Archive.RowGroupSize must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// SQLite file the ingestor appends to.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    /// Root of the partitioned Parquet archive.
    pub fn archive_dir(&self) -> PathBuf {
        self.data_dir.join(ARCHIVE_DIR)
    }
}
