//! Dataset federation.
//!
//! The [`DatasetFederator`] owns the registered sources and strategies and
//! picks a strategy per execution:
//!
//! 1. the requested strategy, if registered and able to handle the pattern;
//! 2. otherwise the first registered strategy that can handle it;
//! 3. otherwise the configured default strategy.
//!
//! Every source call goes through that source's circuit breaker.

pub mod aggregate;
pub mod fallback;
pub mod source;
pub mod strategy;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

pub use aggregate::MultiSourceAggregation;
pub use fallback::PrimaryWithFallback;
pub use source::{BoundSource, SourceSet};
pub use strategy::{FederationStrategy, StrategyOutcome};

use crate::domain::{FederatedResult, FederationMetadata, QueryPattern};
use crate::error::{FederationError, Result, SourceFailure};
use crate::infrastructure::breaker::{BreakerRegistry, CircuitState};
use crate::port::outbound::dataset::{DatasetAdapter, SourceRole};
use crate::port::outbound::monitor::{OperationMonitor, OperationSpan};

/// Name of the primary-with-fallback strategy.
pub const PRIMARY_WITH_FALLBACK: &str = "primary_with_fallback";

/// Name of the multi-source aggregation strategy.
pub const MULTI_SOURCE_AGGREGATION: &str = "multi_source_aggregation";

/// Health of one registered source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceHealth {
    pub source: String,
    pub role: SourceRole,
    pub healthy: bool,
    pub breaker: CircuitState,
    pub checked_at: DateTime<Utc>,
}

/// Routes patterns to sources through a selected strategy.
pub struct DatasetFederator {
    sources: SourceSet,
    strategies: Vec<Arc<dyn FederationStrategy>>,
    default_strategy: String,
    breakers: Arc<BreakerRegistry>,
    monitor: Arc<dyn OperationMonitor>,
}

impl DatasetFederator {
    #[must_use]
    pub fn new(
        default_strategy: impl Into<String>,
        breakers: Arc<BreakerRegistry>,
        monitor: Arc<dyn OperationMonitor>,
    ) -> Self {
        Self {
            sources: SourceSet::default(),
            strategies: Vec::new(),
            default_strategy: default_strategy.into(),
            breakers,
            monitor,
        }
    }

    /// Register a source. Fallbacks are tried in registration order.
    pub fn register_adapter(&mut self, adapter: Arc<dyn DatasetAdapter>) {
        let breaker = self.breakers.get(adapter.source_id());
        info!(source = adapter.source_id(), role = ?adapter.role(), "Registered dataset source");
        self.sources
            .push(Arc::new(BoundSource::new(adapter, breaker, Arc::clone(&self.monitor))));
    }

    /// Register a strategy. Selection considers strategies in registration order.
    pub fn register_strategy(&mut self, strategy: Arc<dyn FederationStrategy>) {
        info!(strategy = strategy.name(), "Registered federation strategy");
        self.strategies.push(strategy);
    }

    /// Source identifiers in registration order.
    #[must_use]
    pub fn sources(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_id()).collect()
    }

    /// Strategy names in registration order.
    #[must_use]
    pub fn strategies(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn default_strategy(&self) -> &str {
        &self.default_strategy
    }

    #[must_use]
    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Strategy that would run `pattern`.
    ///
    /// # Errors
    ///
    /// [`FederationError::NoStrategy`] when nothing fits and the default is
    /// not registered.
    pub fn select_strategy(
        &self,
        pattern: &QueryPattern,
        requested: Option<&str>,
    ) -> Result<Arc<dyn FederationStrategy>> {
        if let Some(name) = requested {
            match self.strategy_named(name) {
                Some(s) if s.can_handle(pattern) => return Ok(Arc::clone(s)),
                Some(_) => warn!(strategy = name, intent = %pattern.intent, "Requested strategy cannot handle pattern"),
                None => warn!(strategy = name, "Requested strategy is not registered"),
            }
        }

        if let Some(s) = self.strategies.iter().find(|s| s.can_handle(pattern)) {
            return Ok(Arc::clone(s));
        }

        self.strategy_named(&self.default_strategy)
            .map(Arc::clone)
            .ok_or_else(|| {
                FederationError::NoStrategy {
                    default: self.default_strategy.clone(),
                }
                .into()
            })
    }

    fn strategy_named(&self, name: &str) -> Option<&Arc<dyn FederationStrategy>> {
        self.strategies.iter().find(|s| s.name() == name)
    }

    /// Run `pattern` against the registered sources.
    ///
    /// # Errors
    ///
    /// [`FederationError::NoAdapters`], [`FederationError::NoStrategy`] or
    /// whatever the selected strategy fails with, typically
    /// [`FederationError::AllSourcesFailed`].
    pub async fn execute(&self, pattern: &QueryPattern, requested: Option<&str>) -> Result<FederatedResult> {
        if self.sources.is_empty() {
            return Err(FederationError::NoAdapters.into());
        }
        let strategy = self.select_strategy(pattern, requested)?;

        let span = OperationSpan::start(
            self.monitor.as_ref(),
            "federation.execute",
            strategy.name(),
            &pattern.intent,
        );
        let started = Instant::now();
        let result = strategy.execute(&self.sources, pattern).await;
        let execution_time_ms = started.elapsed().as_millis() as u64;
        span.finish(&result);

        match result {
            Ok(outcome) => {
                info!(
                    strategy = strategy.name(),
                    intent = %pattern.intent,
                    sources = ?outcome.sources,
                    rows = outcome.data.len(),
                    execution_time_ms,
                    "Federated query completed"
                );
                Ok(FederatedResult {
                    data: outcome.data,
                    metadata: FederationMetadata {
                        sources: outcome.sources,
                        sources_attempted: outcome.sources_attempted,
                        confidence_level: outcome.confidence,
                        strategy: strategy.name().to_string(),
                        execution_time_ms,
                    },
                })
            }
            Err(e) => {
                let msg = e.to_string();
                error!(
                    strategy = strategy.name(),
                    intent = %pattern.intent,
                    execution_time_ms,
                    error = %msg,
                    "Federated query failed"
                );
                Err(e)
            }
        }
    }

    /// Connect every source; failures are returned, not raised.
    pub async fn connect_all(&self) -> Vec<SourceFailure> {
        let mut failures = Vec::new();
        for source in self.sources.iter() {
            if let Err(e) = source.adapter().connect().await {
                warn!(source = source.source_id(), error = %e, "Source failed to connect");
                failures.push(SourceFailure {
                    source: source.source_id().to_string(),
                    error: e.to_string(),
                });
            }
        }
        failures
    }

    /// Probe every source, in registration order.
    pub async fn health_check_all(&self) -> Vec<SourceHealth> {
        let mut report = Vec::with_capacity(self.sources.len());
        for source in self.sources.iter() {
            report.push(SourceHealth {
                source: source.source_id().to_string(),
                role: source.role(),
                healthy: source.adapter().health_check().await,
                breaker: source.breaker().state(),
                checked_at: Utc::now(),
            });
        }
        report
    }

    /// Disconnect every source, logging failures.
    pub async fn disconnect_all(&self) {
        for source in self.sources.iter() {
            if let Err(e) = source.adapter().disconnect().await {
                warn!(source = source.source_id(), error = %e, "Source failed to disconnect");
            }
        }
    }
}
