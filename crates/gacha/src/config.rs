//! Settings and session loading
//!
//! Both live as JSON files in the gachalog config directory. The session
//! can be overridden from the environment and, by the CLI, from flags:
//! 1. Explicit values (command-line flags)
//! 2. Environment variables
//! 3. session.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_ACCESS_TOKEN: &str = "GACHALOG_ACCESS_TOKEN";
const ENV_GACHA_URL: &str = "GACHALOG_GACHA_URL";
const ENV_UID: &str = "GACHALOG_UID";

/// Tool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Record database; defaults to records.sqlite in the config directory
    pub database_path: Option<PathBuf>,
    /// Backup directory; defaults to `backups/` next to the database
    pub backup_dir: Option<PathBuf>,
    /// Number of backups to keep (0 keeps all)
    pub keep_backups: usize,
    /// Attempts per request for transient network failures
    pub max_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            backup_dir: None,
            keep_backups: 10,
            max_retries: 3,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings.json, falling back to defaults when it does not exist
    pub fn load() -> Result<Self> {
        config::load_json_or_default(config::SETTINGS_FILE)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => config::database_path().context("Could not determine config directory"),
        }
    }

    /// Resolved backup directory for a database at `db_path`
    pub fn backup_dir(&self, db_path: &Path) -> PathBuf {
        match &self.backup_dir {
            Some(dir) => dir.clone(),
            None => db_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("backups"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Credentials and endpoint for one sync run
///
/// Loaded once per run and passed explicitly to the sync engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub access_token: String,
    /// Gacha record endpoint
    #[serde(default)]
    pub gacha_url: String,
    /// Account uid cached from an earlier run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl SessionContext {
    pub fn new(access_token: impl Into<String>, gacha_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            gacha_url: gacha_url.into(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Load session.json (if present) with environment overrides applied
    pub fn load() -> Result<Self> {
        let stored: Self = config::load_json_or_default(config::SESSION_FILE)?;

        Ok(stored.overlay(
            std::env::var(ENV_ACCESS_TOKEN).ok(),
            std::env::var(ENV_GACHA_URL).ok(),
            std::env::var(ENV_UID).ok(),
        ))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse session JSON")
    }

    /// Persist to session.json
    pub fn save(&self) -> Result<()> {
        config::save_json(config::SESSION_FILE, self)
    }

    /// Replace fields with any non-empty override
    pub fn overlay(
        mut self,
        access_token: Option<String>,
        gacha_url: Option<String>,
        uid: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(token) = non_empty(access_token) {
            self.access_token = token;
        }
        if let Some(url) = non_empty(gacha_url) {
            self.gacha_url = url;
        }
        if let Some(uid) = non_empty(uid) {
            self.uid = Some(uid);
        }
        self
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// Cached uid, ignoring blanks
    pub fn cached_uid(&self) -> Option<&str> {
        self.uid.as_deref().map(str::trim).filter(|uid| !uid.is_empty())
    }

    /// Access token with everything but the first and last four characters hidden
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.access_token.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_fill_missing_fields() {
        let settings = Settings::from_json(r#"{ "keep_backups": 3 }"#).unwrap();
        assert_eq!(settings.keep_backups, 3);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.request_timeout_secs, 30);
        assert!(settings.database_path.is_none());
    }

    #[test]
    fn test_backup_dir_defaults_next_to_database() {
        let settings = Settings::default();
        let dir = settings.backup_dir(Path::new("/data/gacha/records.sqlite"));
        assert_eq!(dir, PathBuf::from("/data/gacha/backups"));

        let settings = Settings {
            backup_dir: Some(PathBuf::from("/mnt/backups")),
            ..Settings::default()
        };
        assert_eq!(
            settings.backup_dir(Path::new("/data/gacha/records.sqlite")),
            PathBuf::from("/mnt/backups")
        );
    }

    #[test]
    fn test_parse_session() {
        let json = r#"{
            "access_token": "abcd1234efgh5678",
            "gacha_url": "https://gf2-gacha-record.sunborngame.com/list",
            "uid": "20001234"
        }"#;

        let session = SessionContext::from_json(json).unwrap();
        assert!(session.has_access_token());
        assert_eq!(session.cached_uid(), Some("20001234"));
    }

    #[test]
    fn test_overlay_ignores_blank_values() {
        let session = SessionContext::new("stored-token", "https://stored.example/list")
            .with_uid("1")
            .overlay(Some("  ".to_string()), Some("https://flag.example/list".to_string()), None);

        assert_eq!(session.access_token, "stored-token");
        assert_eq!(session.gacha_url, "https://flag.example/list");
        assert_eq!(session.cached_uid(), Some("1"));
    }

    #[test]
    fn test_cached_uid_ignores_blank() {
        let session = SessionContext::new("t", "u").with_uid("  ");
        assert_eq!(session.cached_uid(), None);
    }

    #[test]
    fn test_masked_token() {
        let session = SessionContext::new("abcd1234efgh5678", "");
        assert_eq!(session.masked_token(), "abcd********5678");
        assert_eq!(SessionContext::new("short", "").masked_token(), "*****");
    }
}
