use std::collections::HashMap;
use std::env;
use std::time::Duration;

use syncreads_core::config::{value_or_default, ConfigError, WorkerConfig};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub worker: WorkerConfig,
    pub rate_limit_window: Duration,
    pub sync_rate_limit_per_window: u32,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "SYNCREADS_API_BIND_ADDR", "127.0.0.1:8080");
        let worker = WorkerConfig::from_lookup(&lookup)?;

        let rate_limit_window_secs = value_or_default(&lookup, "RATE_LIMIT_WINDOW_SECS", "60")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "RATE_LIMIT_WINDOW_SECS must be an integer in [10, 3600]".to_string(),
                )
            })?;
        if !(10..=3_600).contains(&rate_limit_window_secs) {
            return Err(ConfigError::Invalid(
                "RATE_LIMIT_WINDOW_SECS must be in [10, 3600]".to_string(),
            ));
        }

        let sync_rate_limit_per_window =
            value_or_default(&lookup, "SYNC_RATE_LIMIT_PER_WINDOW", "10")
                .parse::<u32>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "SYNC_RATE_LIMIT_PER_WINDOW must be an integer in [1, 1000]".to_string(),
                    )
                })?;
        if !(1..=1_000).contains(&sync_rate_limit_per_window) {
            return Err(ConfigError::Invalid(
                "SYNC_RATE_LIMIT_PER_WINDOW must be in [1, 1000]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            worker,
            rate_limit_window: Duration::from_secs(rate_limit_window_secs),
            sync_rate_limit_per_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        ApiConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_bind_and_limits() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.rate_limit_window, Duration::from_secs(60));
        assert_eq!(config.sync_rate_limit_per_window, 10);
        assert_eq!(config.worker.folder_name, "SyncReads");
    }

    #[test]
    fn config_rejects_out_of_range_limits() {
        let err = config_from(&[("SYNC_RATE_LIMIT_PER_WINDOW", "0")]).unwrap_err();
        assert!(err.to_string().contains("SYNC_RATE_LIMIT_PER_WINDOW"));
        assert!(config_from(&[("RATE_LIMIT_WINDOW_SECS", "5")]).is_err());
    }

    #[test]
    fn worker_errors_surface() {
        let err = config_from(&[("COMMIT_MAX_ATTEMPTS", "zero")]).unwrap_err();
        assert!(err.to_string().contains("COMMIT_MAX_ATTEMPTS"));
    }
}
