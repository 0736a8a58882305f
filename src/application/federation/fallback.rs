//! Primary source first, then each fallback in registration order.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::source::SourceSet;
use super::strategy::{FederationStrategy, StrategyOutcome};
use super::PRIMARY_WITH_FALLBACK;
use crate::domain::QueryPattern;
use crate::error::{FederationError, Result, SourceFailure};

/// Returns the first successful source's data.
///
/// Confidence is 0.95 when the primary answered and 0.85 for any fallback.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimaryWithFallback;

#[async_trait]
impl FederationStrategy for PrimaryWithFallback {
    fn name(&self) -> &str {
        PRIMARY_WITH_FALLBACK
    }

    fn can_handle(&self, _pattern: &QueryPattern) -> bool {
        true
    }

    async fn execute(&self, sources: &SourceSet, pattern: &QueryPattern) -> Result<StrategyOutcome> {
        let mut attempted = Vec::with_capacity(sources.len());
        let mut failures = Vec::new();

        for (index, source) in sources.fallback_order() {
            let id = source.source_id().to_string();
            attempted.push(id.clone());
            match source.fetch(pattern).await {
                Ok(data) => {
                    debug!(source = %id, rows = data.len(), attempts = attempted.len(), "Source answered");
                    return Ok(StrategyOutcome {
                        data,
                        sources: vec![id],
                        sources_attempted: attempted,
                        confidence: sources.weight(index),
                    });
                }
                Err(e) => {
                    warn!(source = %id, error = %e, "Source failed, trying next");
                    failures.push(SourceFailure {
                        source: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(FederationError::AllSourcesFailed { attempts: failures }.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::federation::source::BoundSource;
    use crate::error::Error;
    use crate::infrastructure::breaker::CircuitBreaker;
    use crate::port::outbound::dataset::DatasetAdapter;
    use crate::port::outbound::monitor::NullMonitor;
    use crate::testkit::config;
    use crate::testkit::dataset::ScriptedDataset;
    use crate::testkit::domain::{county, population_pattern};

    fn set(datasets: Vec<Arc<ScriptedDataset>>) -> SourceSet {
        let mut set = SourceSet::default();
        for dataset in datasets {
            let breaker = Arc::new(CircuitBreaker::new(dataset.source_id(), config::breaker(5)));
            set.push(Arc::new(BoundSource::new(dataset, breaker, Arc::new(NullMonitor))));
        }
        set
    }

    #[tokio::test]
    async fn primary_success_skips_fallbacks() {
        let primary = Arc::new(ScriptedDataset::new("census_db").primary().with_rows(vec![county("Travis", "TX", 1)]));
        let backup = Arc::new(ScriptedDataset::new("acs_snapshot"));
        let sources = set(vec![backup.clone(), primary.clone()]);

        let outcome = PrimaryWithFallback
            .execute(&sources, &population_pattern(&["Travis"]))
            .await
            .unwrap();

        assert_eq!(outcome.sources, vec!["census_db"]);
        assert_eq!(outcome.sources_attempted, vec!["census_db"]);
        assert_eq!(outcome.confidence, 0.95);
        assert_eq!(outcome.data.len(), 1);
        assert_eq!(backup.queries(), 0);
    }

    #[tokio::test]
    async fn falls_back_in_registration_order() {
        let primary = Arc::new(ScriptedDataset::new("census_db").primary().failing("locked"));
        let first = Arc::new(ScriptedDataset::new("acs_snapshot").failing("missing file"));
        let second = Arc::new(ScriptedDataset::new("bls_api").with_rows(vec![county("Travis", "TX", 1)]));
        let sources = set(vec![primary, first, second]);

        let outcome = PrimaryWithFallback
            .execute(&sources, &population_pattern(&[]))
            .await
            .unwrap();

        assert_eq!(outcome.sources, vec!["bls_api"]);
        assert_eq!(outcome.sources_attempted, vec!["census_db", "acs_snapshot", "bls_api"]);
        assert_eq!(outcome.confidence, 0.85);
    }

    #[tokio::test]
    async fn all_failed_lists_each_attempt() {
        let sources = set(vec![
            Arc::new(ScriptedDataset::new("census_db").primary().failing("locked")),
            Arc::new(ScriptedDataset::new("acs_snapshot").failing("missing file")),
        ]);

        let err = PrimaryWithFallback
            .execute(&sources, &population_pattern(&[]))
            .await
            .unwrap_err();

        let Error::Federation(FederationError::AllSourcesFailed { attempts }) = err else {
            panic!("expected AllSourcesFailed, got {err:?}");
        };
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].source, "census_db");
        assert!(attempts[0].error.contains("locked"));
        assert_eq!(attempts[1].source, "acs_snapshot");
        assert!(attempts[1].error.contains("missing file"));
    }

    #[tokio::test]
    async fn empty_result_counts_as_success() {
        let primary = Arc::new(ScriptedDataset::new("census_db").primary());
        let backup = Arc::new(ScriptedDataset::new("acs_snapshot").with_rows(vec![county("Travis", "TX", 1)]));
        let sources = set(vec![primary, backup.clone()]);

        let outcome = PrimaryWithFallback
            .execute(&sources, &population_pattern(&[]))
            .await
            .unwrap();

        assert!(outcome.data.is_empty());
        assert_eq!(outcome.sources, vec!["census_db"]);
        assert_eq!(backup.queries(), 0);
    }
}
