//! Retry policy for failed transfers.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;

use super::config::RetryConfig;

/// Tracks failed attempts per location and decides when to resubmit.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempts: Mutex<HashMap<String, u32>>,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.max_retries > 0
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Record a failure for `location`.
    ///
    /// Returns the delay before the next attempt, or `None` when attempts are
    /// exhausted. The counter is cleared once exhausted.
    pub async fn record_failure(&self, location: &str) -> Option<(u32, Duration)> {
        if !self.is_enabled() {
            return None;
        }

        let mut attempts = self.attempts.lock().await;
        let attempt = attempts.entry(location.to_string()).or_insert(0);
        *attempt += 1;

        if *attempt > self.config.max_retries {
            attempts.remove(location);
            return None;
        }

        let attempt = *attempt;
        Some((attempt, self.delay_for(attempt)))
    }

    /// Forget the failures recorded for `location`.
    pub async fn clear(&self, location: &str) {
        self.attempts.lock().await.remove(location);
    }

    /// Forget every recorded failure.
    pub async fn reset(&self) {
        self.attempts.lock().await.clear();
    }

    pub async fn attempts(&self, location: &str) -> u32 {
        self.attempts
            .lock()
            .await
            .get(location)
            .copied()
            .unwrap_or(0)
    }
}
