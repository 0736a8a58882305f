//! Federation strategy trait.

use std::sync::Arc;

use async_trait::async_trait;

use super::aggregate::MultiSourceAggregation;
use super::fallback::PrimaryWithFallback;
use super::source::SourceSet;
use crate::domain::{QueryPattern, Record};
use crate::error::Result;

/// What a strategy produced, before timing and naming are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub data: Vec<Record>,
    /// Sources whose data made it into `data`.
    pub sources: Vec<String>,
    /// Every source the strategy queried.
    pub sources_attempted: Vec<String>,
    pub confidence: f64,
}

/// A way of combining registered sources into one answer.
///
/// Implementations must be stateless with respect to individual queries;
/// one instance serves every execution concurrently.
#[async_trait]
pub trait FederationStrategy: Send + Sync {
    /// Unique name used for selection and reported in result metadata.
    fn name(&self) -> &str;

    /// Whether this strategy is suitable for `pattern`.
    fn can_handle(&self, pattern: &QueryPattern) -> bool;

    /// Run `pattern` against `sources`.
    ///
    /// # Errors
    ///
    /// [`FederationError::AllSourcesFailed`](crate::error::FederationError::AllSourcesFailed)
    /// when no source contributed data.
    async fn execute(&self, sources: &SourceSet, pattern: &QueryPattern) -> Result<StrategyOutcome>;
}

/// Built-in strategy registered under `name`, if any.
#[must_use]
pub fn builtin(name: &str) -> Option<Arc<dyn FederationStrategy>> {
    match name {
        super::PRIMARY_WITH_FALLBACK => Some(Arc::new(PrimaryWithFallback)),
        super::MULTI_SOURCE_AGGREGATION => Some(Arc::new(MultiSourceAggregation)),
        _ => None,
    }
}
