//! Engine connection pool configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Engine settings applied once to every newly opened session.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineTuning {
    /// Memory budget per session in megabytes.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    /// Worker threads the engine may use per session.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Extra statements run after tuning (attach datasets, create views).
    #[serde(default)]
    pub setup_statements: Vec<String>,
}

fn default_memory_limit_mb() -> u64 {
    512
}

fn default_threads() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            memory_limit_mb: default_memory_limit_mb(),
            threads: default_threads(),
            setup_statements: Vec::new(),
        }
    }
}

/// Bounds and timeouts for one engine connection pool.
///
/// Invariant: `min_connections <= max_connections` and `max_connections > 0`.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Idle connections kept open; excess idle connections are closed on release.
    #[serde(default = "default_min_connections")]
    pub min_connections: usize,
    /// Hard cap on open connections (idle + active).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// How long `acquire` waits in the queue before failing (milliseconds).
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// How long opening a new engine session may take (milliseconds).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default)]
    pub tuning: EngineTuning,
}

const fn default_min_connections() -> usize {
    1
}

const fn default_max_connections() -> usize {
    4
}

const fn default_acquire_timeout_ms() -> u64 {
    5_000
}

const fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            tuning: EngineTuning::default(),
        }
    }
}

impl PoolConfig {
    /// Pool bounded to `min..=max` connections with default timeouts.
    #[must_use]
    pub fn bounded(min_connections: usize, max_connections: usize) -> Self {
        Self {
            min_connections,
            max_connections,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Validate pool bounds and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: &str| ConfigError::InvalidValue {
            field,
            reason: reason.to_string(),
        };

        if self.max_connections == 0 {
            return Err(invalid("pool.max_connections", "must be > 0"));
        }
        if self.min_connections > self.max_connections {
            return Err(invalid(
                "pool.min_connections",
                "must be <= pool.max_connections",
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(invalid("pool.acquire_timeout_ms", "must be > 0"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(invalid("pool.connect_timeout_ms", "must be > 0"));
        }
        if self.tuning.threads == 0 {
            return Err(invalid("pool.tuning.threads", "must be > 0"));
        }
        Ok(())
    }
}
