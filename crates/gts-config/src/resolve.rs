//! Config file resolution.
//!
//! Precedence: explicit `--config` path, then `GTFS_SCRAPER_CONFIG`, then
//! `gtfs-scraper.json` in the working directory.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "GTFS_SCRAPER_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gtfs-scraper.json";

/// Pick the config file path without touching the filesystem.
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    resolve_with_env(cli_path, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn resolve_with_env(cli_path: Option<&Path>, env_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    match env_path {
        Some(path) if !path.as_os_str().is_empty() => path,
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Resolve, read, parse and validate the config file.
pub fn load_config(cli_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(cli_path);
    let content = fs::read_to_string(&path).map_err(|e| ConfigError::Io {
        path: path.clone(),
        source: e,
    })?;
    Config::from_json(&content, &path)
}
