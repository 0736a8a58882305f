//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; every section is optional.
//!
//! # Example
//!
//! ```no_run
//! use queryweave::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("queryweave.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::breaker::BreakerConfig;
use super::cache::CacheConfig;
use super::federation::{validate_sources, FederationConfig, SourceConfig};
use super::logging::LoggingConfig;
use super::pool::PoolConfig;
use crate::error::{ConfigError, Result};

/// Environment variable naming the config file used by the binary.
pub const CONFIG_PATH_ENV: &str = "QUERYWEAVE_CONFIG";

/// Config file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "queryweave.toml";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Default pool settings for engine-backed sources.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Circuit breaker thresholds, applied per dependency.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Strategy selection.
    #[serde(default)]
    pub federation: FederationConfig,

    /// Data sources, in registration order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path from the environment, falling back to the default.
    #[must_use]
    pub fn path_from_env() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        self.pool.validate()?;
        self.cache.validate()?;
        self.breaker.validate()?;
        self.federation.validate()?;
        validate_sources(&self.sources)?;
        Ok(())
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::infrastructure::config::federation::SourceKind;
    use crate::port::outbound::dataset::SourceRole;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse_toml("").unwrap();
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.federation.default_strategy, "primary_with_fallback");
        assert!(config.sources.is_empty());
    }

    #[test]
    fn parses_sources() {
        let config = Config::parse_toml(
            r#"
            [[sources]]
            id = "census_db"
            role = "primary"
            type = "engine"
            database = ":memory:"

            [sources.pool]
            max_connections = 2

            [[sources]]
            id = "acs_snapshot"
            type = "snapshot"
            path = "data/acs.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].role, SourceRole::Primary);
        match &config.sources[0].kind {
            SourceKind::Engine(engine) => {
                assert_eq!(engine.database, ":memory:");
                assert_eq!(engine.pool.as_ref().unwrap().max_connections, 2);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(config.sources[1].role, SourceRole::Fallback);
        assert!(matches!(config.sources[1].kind, SourceKind::Snapshot(_)));
    }

    #[test]
    fn rejects_invalid_pool_bounds() {
        let err = Config::parse_toml(
            r#"
            [pool]
            min_connections = 5
            max_connections = 2
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "pool.min_connections",
                ..
            })
        ));
    }

    #[test]
    fn rejects_two_primaries() {
        let err = Config::parse_toml(
            r#"
            [[sources]]
            id = "a"
            role = "primary"
            type = "snapshot"
            path = "a.json"

            [[sources]]
            id = "b"
            role = "primary"
            type = "snapshot"
            path = "b.json"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("at most one primary"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = Config::parse_toml(
            r#"
            [[sources]]
            id = "a"
            type = "snapshot"
            path = "a.json"

            [[sources]]
            id = "a"
            type = "snapshot"
            path = "b.json"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = Config::parse_toml(
            r#"
            [federation]
            strategies = ["primary_with_fallback", "round_robin"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidValue {
                field: "federation.strategies",
                ..
            })
        ));
        assert!(err.to_string().contains("round_robin"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(Config::parse_toml("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
    }
}
