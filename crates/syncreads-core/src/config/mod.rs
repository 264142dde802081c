//! Worker configuration shared by the CLI and the API server.
//!
//! Values come from the process environment (binaries load `.env` first);
//! `from_lookup` takes any lookup function so parsing is testable in
//! isolation.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::remote::{DEFAULT_AUTH_URL, DEFAULT_SYNC_URL};
use crate::util::{is_http_url, normalize_text_option};

/// Device folder synced articles land in
pub const DEFAULT_FOLDER_NAME: &str = "SyncReads";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Explicit database location; binaries fall back to a per-user data dir
    pub database_path: Option<PathBuf>,
    pub remarkable_auth_url: String,
    pub remarkable_sync_url: String,
    /// Headless Chrome used to print articles
    pub chrome_bin: Option<PathBuf>,
    pub folder_name: String,
    pub remote_call_timeout: Duration,
    pub commit_max_attempts: u32,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_path = optional_trimmed(&lookup, "SYNCREADS_DB_PATH").map(PathBuf::from);

        let remarkable_auth_url =
            value_or_default(&lookup, "REMARKABLE_AUTH_URL", DEFAULT_AUTH_URL);
        if !is_http_url(&remarkable_auth_url) {
            return Err(ConfigError::Invalid(
                "REMARKABLE_AUTH_URL must start with http:// or https://".to_string(),
            ));
        }

        let remarkable_sync_url =
            value_or_default(&lookup, "REMARKABLE_SYNC_URL", DEFAULT_SYNC_URL);
        if !is_http_url(&remarkable_sync_url) {
            return Err(ConfigError::Invalid(
                "REMARKABLE_SYNC_URL must start with http:// or https://".to_string(),
            ));
        }

        let chrome_bin = optional_trimmed(&lookup, "CHROME_BIN").map(PathBuf::from);
        let folder_name = value_or_default(&lookup, "SYNCREADS_FOLDER", DEFAULT_FOLDER_NAME);

        let timeout_secs = value_or_default(&lookup, "REMOTE_CALL_TIMEOUT_SECS", "30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "REMOTE_CALL_TIMEOUT_SECS must be an integer in [1, 600]".to_string(),
                )
            })?;
        if !(1..=600).contains(&timeout_secs) {
            return Err(ConfigError::Invalid(
                "REMOTE_CALL_TIMEOUT_SECS must be in [1, 600]".to_string(),
            ));
        }

        let commit_max_attempts = value_or_default(&lookup, "COMMIT_MAX_ATTEMPTS", "3")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "COMMIT_MAX_ATTEMPTS must be an integer in [1, 10]".to_string(),
                )
            })?;
        if !(1..=10).contains(&commit_max_attempts) {
            return Err(ConfigError::Invalid(
                "COMMIT_MAX_ATTEMPTS must be in [1, 10]".to_string(),
            ));
        }

        Ok(Self {
            database_path,
            remarkable_auth_url,
            remarkable_sync_url,
            chrome_bin,
            folder_name,
            remote_call_timeout: Duration::from_secs(timeout_secs),
            commit_max_attempts,
        })
    }

    /// Chrome binary, required only by commands that render articles
    pub fn require_chrome_bin(&self) -> Result<&PathBuf, ConfigError> {
        self.chrome_bin
            .as_ref()
            .ok_or(ConfigError::MissingVar("CHROME_BIN"))
    }
}

pub fn value_or_default(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: &str,
) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_from(pairs: &[(&str, &str)]) -> Result<WorkerConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        WorkerConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_path, None);
        assert_eq!(config.remarkable_auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.remarkable_sync_url, DEFAULT_SYNC_URL);
        assert_eq!(config.folder_name, "SyncReads");
        assert_eq!(config.remote_call_timeout, Duration::from_secs(30));
        assert_eq!(config.commit_max_attempts, 3);
        assert!(matches!(
            config.require_chrome_bin(),
            Err(ConfigError::MissingVar("CHROME_BIN"))
        ));
    }

    #[test]
    fn values_are_trimmed() {
        let config = config_from(&[
            ("SYNCREADS_DB_PATH", " /tmp/syncreads.db "),
            ("CHROME_BIN", "/usr/bin/chromium"),
            ("SYNCREADS_FOLDER", " Articles "),
            ("REMOTE_CALL_TIMEOUT_SECS", "5"),
        ])
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/syncreads.db")));
        assert_eq!(config.folder_name, "Articles");
        assert_eq!(config.remote_call_timeout, Duration::from_secs(5));
        assert_eq!(
            config.require_chrome_bin().unwrap(),
            &PathBuf::from("/usr/bin/chromium")
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(config_from(&[("REMOTE_CALL_TIMEOUT_SECS", "0")]).is_err());
        assert!(config_from(&[("REMOTE_CALL_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("COMMIT_MAX_ATTEMPTS", "11")]).is_err());
        let err = config_from(&[("REMARKABLE_SYNC_URL", "cloud.example.com")]).unwrap_err();
        assert!(err.to_string().contains("REMARKABLE_SYNC_URL"));
    }
}
