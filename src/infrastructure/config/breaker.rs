//! Circuit breaker configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Thresholds shared by every per-dependency breaker.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerConfig {
    /// Failures inside the monitoring window that trip the breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cooldown before an open breaker lets a trial call through (milliseconds).
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
    /// Failures older than this are forgotten (milliseconds).
    #[serde(default = "default_monitoring_window_ms")]
    pub monitoring_window_ms: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_timeout_ms() -> u64 {
    30_000
}

const fn default_monitoring_window_ms() -> u64 {
    60_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            monitoring_window_ms: default_monitoring_window_ms(),
        }
    }
}

impl BreakerConfig {
    #[must_use]
    pub fn new(failure_threshold: u32, reset_timeout: Duration, monitoring_window: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout_ms: reset_timeout.as_millis() as u64,
            monitoring_window_ms: monitoring_window.as_millis() as u64,
        }
    }

    #[must_use]
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    #[must_use]
    pub fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.monitoring_window_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                field: "breaker.failure_threshold",
                reason: "must be > 0".into(),
            });
        }
        if self.reset_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "breaker.reset_timeout_ms",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}
