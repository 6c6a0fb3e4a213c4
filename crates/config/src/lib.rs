//! Configuration directory helpers for gachalog
//!
//! Every file the tool keeps outside the record database (session, settings)
//! lives in the shared config directory (~/.config/gachalog/).
//!
//! Call [`init`] at application startup to bootstrap the config directory.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory created under the platform config dir
const APP_DIR: &str = "gachalog";

/// Tool settings (database location, backups, network)
pub const SETTINGS_FILE: &str = "settings.json";

/// Saved access token, record endpoint and cached uid
pub const SESSION_FILE: &str = "session.json";

/// Record database used when settings name none
pub const DATABASE_FILE: &str = "records.sqlite";

/// Initialize the config directory.
///
/// Creates ~/.config/gachalog/ if it doesn't exist.
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

/// Get the config directory (~/.config/gachalog/)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Get the path to a file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load a JSON file from the config directory, or `T::default()` if absent
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    match config_path(filename) {
        Some(path) => load_json_file_or_default(&path),
        None => Ok(T::default()),
    }
}

/// Load a JSON file, or `T::default()` if it does not exist
///
/// A file that exists but cannot be parsed is still an error.
pub fn load_json_file_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() {
        load_json_file(path)
    } else {
        Ok(T::default())
    }
}

/// Default record database path (~/.config/gachalog/records.sqlite)
pub fn database_path() -> Option<PathBuf> {
    config_path(DATABASE_FILE)
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as JSON to a file in the config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<()> {
    let dir = ensure_config_dir()?;
    save_json_file(&dir.join(filename), value)
}

/// Save a value as pretty-printed JSON to an arbitrary path
pub fn save_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}
