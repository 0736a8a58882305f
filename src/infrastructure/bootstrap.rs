//! Composition root: builds the query core from configuration.
//!
//! Nothing here is global. [`build`] returns a [`QueryCore`] holding every
//! component behind `Arc`s; callers pass those down explicitly.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapter::outbound::dataset::{EngineDataset, SnapshotDataset};
use crate::adapter::outbound::sqlite::SqliteEngine;
use crate::application::cache::ResultCache;
use crate::application::federation::{strategy, DatasetFederator, SourceHealth};
use crate::application::query::QueryExecutor;
use crate::error::{ConfigError, Result};
use crate::infrastructure::breaker::BreakerRegistry;
use crate::infrastructure::config::federation::SourceKind;
use crate::infrastructure::config::settings::Config;
use crate::infrastructure::pool::{ConnectionPool, PoolStats};
use crate::port::outbound::dataset::DatasetAdapter;
use crate::port::outbound::monitor::OperationMonitor;

/// Every long-lived component of a running core.
pub struct QueryCore {
    pub executor: Arc<QueryExecutor>,
    pub federator: Arc<DatasetFederator>,
    pub breakers: Arc<BreakerRegistry>,
    pools: Vec<(String, ConnectionPool)>,
}

impl QueryCore {
    /// Pool statistics per engine-backed source, in registration order.
    #[must_use]
    pub fn pool_stats(&self) -> Vec<(String, PoolStats)> {
        self.pools
            .iter()
            .map(|(id, pool)| (id.clone(), pool.stats()))
            .collect()
    }

    pub async fn health(&self) -> Vec<SourceHealth> {
        self.federator.health_check_all().await
    }

    /// Disconnect every source; engine sources close their pools.
    pub async fn shutdown(&self) {
        info!("Shutting down query core");
        self.federator.disconnect_all().await;
    }
}

/// Wire sources, strategies, cache and executor from `config`.
///
/// Sources are registered in configuration order. No connection is opened;
/// call [`start`] to also connect them.
///
/// # Errors
///
/// Returns a config error for an unknown strategy name or invalid pool
/// settings.
pub fn build(config: &Config, monitor: Arc<dyn OperationMonitor>) -> Result<QueryCore> {
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let mut federator = DatasetFederator::new(
        config.federation.default_strategy.clone(),
        Arc::clone(&breakers),
        Arc::clone(&monitor),
    );

    for name in &config.federation.strategies {
        let strategy = strategy::builtin(name).ok_or_else(|| ConfigError::InvalidValue {
            field: "federation.strategies",
            reason: format!("unknown strategy '{name}'"),
        })?;
        federator.register_strategy(strategy);
    }

    let mut pools = Vec::new();
    for source in &config.sources {
        let adapter: Arc<dyn DatasetAdapter> = match &source.kind {
            SourceKind::Engine(engine) => {
                let pool_config = engine.pool.clone().unwrap_or_else(|| config.pool.clone());
                let sqlite = SqliteEngine::new(source.id.clone(), engine.database.clone())
                    .read_only(engine.read_only)
                    .with_tuning(pool_config.tuning.clone());
                let pool = ConnectionPool::new(pool_config, Arc::new(sqlite), Arc::clone(&monitor))?;
                pools.push((source.id.clone(), pool.clone()));
                Arc::new(EngineDataset::new(source.id.clone(), pool).with_role(source.role))
            }
            SourceKind::Snapshot(snapshot) => {
                Arc::new(SnapshotDataset::new(source.id.clone(), &snapshot.path).with_role(source.role))
            }
        };
        federator.register_adapter(adapter);
    }

    if config.sources.is_empty() {
        warn!("No data sources configured; every query will fail");
    }

    let federator = Arc::new(federator);
    let cache = ResultCache::new(config.cache.clone());
    let executor = Arc::new(QueryExecutor::new(cache, Arc::clone(&federator)));

    info!(
        sources = config.sources.len(),
        strategies = ?federator.strategies(),
        default_strategy = federator.default_strategy(),
        "Query core assembled"
    );

    Ok(QueryCore {
        executor,
        federator,
        breakers,
        pools,
    })
}

/// [`build`] and connect every source.
///
/// A source that fails to connect stays registered; its breaker and the
/// fallback order handle it at query time.
pub async fn start(config: &Config, monitor: Arc<dyn OperationMonitor>) -> Result<QueryCore> {
    let core = build(config, monitor)?;
    for failure in core.federator.connect_all().await {
        warn!(source = %failure.source, error = %failure.error, "Source unavailable at startup");
    }
    Ok(core)
}
