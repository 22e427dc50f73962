//! Download engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the download engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of transfers in flight at once.
    /// Further downloads wait for a free slot.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// How often informers without push completion are checked (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Capacity of the completed-items output channel.
    #[serde(default = "default_output_buffer")]
    pub output_buffer: usize,

    /// Resubmission of failed transfers.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_output_buffer() -> usize {
    10
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            poll_interval_ms: default_poll_interval(),
            output_buffer: default_output_buffer(),
            retry: RetryConfig::default(),
        }
    }
}

/// Bounded exponential backoff for failed transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts after the first one (0 = never retry).
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds).
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Upper bound for any single delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    60_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_downloads, 2);
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.output_buffer, 10);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: EngineConfig = toml::from_str("max_concurrent_downloads = 4").unwrap();
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_deserialize_retry_section() {
        let toml = r#"
            poll_interval_ms = 250

            [retry]
            max_retries = 3
            base_delay_ms = 500
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.retry.max_delay_ms, 60_000);
    }
}
