//! GTFS scraper configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for `gtfs-scraper.json`
//! - Config file resolution (CLI → env → working directory)
//! - Semantic validation
//! - Data directory layout helpers

pub mod config;
pub mod resolve;

pub use config::{ArchiveSettings, Config, ConfigError, DEFAULT_ROW_GROUP_SIZE};
pub use resolve::{load_config, resolve_config_path, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};
