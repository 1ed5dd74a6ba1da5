//! Runtime configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The engine's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,
    /// The base URL of the ingestion backend.
    pub backend_url: String,

    /// The capacity of the reconciliation buffer.
    #[serde(default = "Config::default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// The minimum interval between two commits to the view, in milliseconds.
    #[serde(default = "Config::default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    /// The interval between stream health checks, in seconds.
    #[serde(default = "Config::default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
    /// How long a running stream may go without arrivals before it is
    /// declared stale, in seconds.
    #[serde(default = "Config::default_staleness_threshold_secs")]
    pub staleness_threshold_secs: u64,
    /// The grace delay between a stale signal and the forced reset, in
    /// milliseconds.
    #[serde(default = "Config::default_stale_reset_grace_ms")]
    pub stale_reset_grace_ms: u64,
    /// The fast poll interval for pipeline counts, in milliseconds.
    #[serde(default = "Config::default_fast_poll_interval_ms")]
    pub fast_poll_interval_ms: u64,
    /// The slow poll interval for full run/step/history metadata, in seconds.
    #[serde(default = "Config::default_slow_poll_interval_secs")]
    pub slow_poll_interval_secs: u64,
    /// The interval between pull refreshes of ingested records, in seconds.
    #[serde(default = "Config::default_pull_refresh_interval_secs")]
    pub pull_refresh_interval_secs: u64,
    /// The timeout applied to every backend request, in seconds.
    #[serde(default = "Config::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// The maximum number of records requested per pull batch.
    #[serde(default = "Config::default_pull_batch_limit")]
    pub pull_batch_limit: u32,
}

impl Config {
    /// Create a new config instance from the runtime environment.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        Ok(config)
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_secs(self.staleness_threshold_secs)
    }

    pub fn stale_reset_grace(&self) -> Duration {
        Duration::from_millis(self.stale_reset_grace_ms)
    }

    pub fn fast_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fast_poll_interval_ms)
    }

    pub fn slow_poll_interval(&self) -> Duration {
        Duration::from_secs(self.slow_poll_interval_secs)
    }

    pub fn pull_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.pull_refresh_interval_secs)
    }

    fn default_buffer_capacity() -> usize {
        1000
    }

    fn default_commit_interval_ms() -> u64 {
        2000
    }

    fn default_health_check_interval_secs() -> u64 {
        30
    }

    fn default_staleness_threshold_secs() -> u64 {
        120
    }

    fn default_stale_reset_grace_ms() -> u64 {
        3000
    }

    fn default_fast_poll_interval_ms() -> u64 {
        500
    }

    fn default_slow_poll_interval_secs() -> u64 {
        3
    }

    fn default_pull_refresh_interval_secs() -> u64 {
        10
    }

    fn default_request_timeout_secs() -> u64 {
        30
    }

    fn default_pull_batch_limit() -> u32 {
        1000
    }
}

#[cfg(test)]
impl Config {
    /// Create a config instance for tests.
    pub fn new_test() -> std::sync::Arc<Self> {
        let config: Config = envy::from_iter(vec![
            ("RUST_LOG".into(), "error".into()),
            ("BACKEND_URL".into(), "http://localhost:9000".into()),
        ])
        .expect("test config must deserialize");
        std::sync::Arc::new(config)
    }
}
