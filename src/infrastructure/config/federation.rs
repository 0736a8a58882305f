//! Federation and data source configuration.

use serde::Deserialize;

use super::pool::PoolConfig;
use crate::application::federation::{MULTI_SOURCE_AGGREGATION, PRIMARY_WITH_FALLBACK};
use crate::error::ConfigError;
use crate::port::outbound::dataset::SourceRole;

/// Strategy selection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Strategy used when neither the requested nor any registered strategy fits.
    #[serde(default = "default_strategy")]
    pub default_strategy: String,
    /// Strategies to register, in selection order.
    #[serde(default = "default_enabled")]
    pub strategies: Vec<String>,
}

fn default_strategy() -> String {
    PRIMARY_WITH_FALLBACK.into()
}

fn default_enabled() -> Vec<String> {
    vec![PRIMARY_WITH_FALLBACK.into(), MULTI_SOURCE_AGGREGATION.into()]
}

const KNOWN_STRATEGIES: [&str; 2] = [PRIMARY_WITH_FALLBACK, MULTI_SOURCE_AGGREGATION];

impl FederationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_strategy.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "federation.default_strategy",
            });
        }
        if let Some(unknown) = self
            .strategies
            .iter()
            .find(|name| !KNOWN_STRATEGIES.contains(&name.as_str()))
        {
            return Err(ConfigError::InvalidValue {
                field: "federation.strategies",
                reason: format!("unknown strategy '{unknown}'"),
            });
        }
        Ok(())
    }
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            default_strategy: default_strategy(),
            strategies: default_enabled(),
        }
    }
}

/// SQLite-backed source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSourceConfig {
    /// Database file, or `":memory:"`.
    pub database: String,
    /// Open the database read-only.
    #[serde(default)]
    pub read_only: bool,
    /// Pool override for this source; falls back to the top-level `[pool]`.
    #[serde(default)]
    pub pool: Option<PoolConfig>,
}

/// JSON snapshot source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSourceConfig {
    /// File holding a JSON array of records.
    pub path: String,
}

/// Kind-specific source settings, selected by the `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceKind {
    Engine(EngineSourceConfig),
    Snapshot(SnapshotSourceConfig),
}

/// One `[[sources]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    #[serde(default)]
    pub role: SourceRole,
    #[serde(flatten)]
    pub kind: SourceKind,
}

pub(crate) fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for source in sources {
        if source.id.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "sources.id" });
        }
        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "sources.id",
                reason: format!("duplicate source id '{}'", source.id),
            });
        }
        if let SourceKind::Engine(engine) = &source.kind {
            if let Some(pool) = &engine.pool {
                pool.validate()?;
            }
        }
    }
    let primaries = sources
        .iter()
        .filter(|s| s.role == SourceRole::Primary)
        .count();
    if primaries > 1 {
        return Err(ConfigError::InvalidValue {
            field: "sources.role",
            reason: format!("at most one primary source allowed, found {primaries}"),
        });
    }
    Ok(())
}
