//! Query service: cache in front of the federator.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::application::cache::ResultCache;
use crate::application::federation::DatasetFederator;
use crate::domain::{QueryPattern, QueryResponse, ResponseMetadata};
use crate::error::{Error, Result};
use crate::port::inbound::query::{QueryService, QueryTranslator};

/// Serves patterns from the result cache, federating on a miss.
pub struct QueryExecutor {
    cache: ResultCache,
    federator: Arc<DatasetFederator>,
    translator: Option<Arc<dyn QueryTranslator>>,
    preferred_strategy: Option<String>,
}

impl QueryExecutor {
    #[must_use]
    pub fn new(cache: ResultCache, federator: Arc<DatasetFederator>) -> Self {
        Self {
            cache,
            federator,
            translator: None,
            preferred_strategy: None,
        }
    }

    #[must_use]
    pub fn with_translator(mut self, translator: Arc<dyn QueryTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Ask the federator for `strategy` on every execution.
    #[must_use]
    pub fn with_preferred_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.preferred_strategy = Some(strategy.into());
        self
    }

    #[must_use]
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    #[must_use]
    pub fn federator(&self) -> &Arc<DatasetFederator> {
        &self.federator
    }
}

#[async_trait]
impl QueryService for QueryExecutor {
    async fn execute_query(&self, pattern: &QueryPattern) -> Result<QueryResponse> {
        let started = Instant::now();
        let federator = Arc::clone(&self.federator);
        let owned = pattern.clone();
        let strategy = self.preferred_strategy.clone();

        let cached = self
            .cache
            .get_or_fetch(pattern, move || async move {
                federator.execute(&owned, strategy.as_deref()).await
            })
            .await?;

        let execution_time_ms = started.elapsed().as_millis() as u64;
        debug!(
            intent = %pattern.intent,
            cached = cached.cached,
            stale = cached.stale,
            execution_time_ms,
            "Query served"
        );

        let result = cached.value;
        Ok(QueryResponse {
            data: result.data,
            metadata: ResponseMetadata {
                cached: cached.cached,
                stale: cached.stale,
                sources: result.metadata.sources,
                sources_attempted: result.metadata.sources_attempted,
                confidence_level: result.metadata.confidence_level,
                strategy: result.metadata.strategy,
                execution_time_ms,
            },
        })
    }

    async fn ask(&self, text: &str) -> Result<QueryResponse> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| Error::Translation("no query translator configured".into()))?;
        let pattern = translator.translate(text).await?;
        self.execute_query(&pattern).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::federation::{PrimaryWithFallback, PRIMARY_WITH_FALLBACK};
    use crate::infrastructure::breaker::BreakerRegistry;
    use crate::port::outbound::monitor::NullMonitor;
    use crate::testkit::config;
    use crate::testkit::dataset::ScriptedDataset;
    use crate::testkit::domain::{county, population_pattern};

    struct KeywordTranslator;

    #[async_trait]
    impl QueryTranslator for KeywordTranslator {
        async fn translate(&self, text: &str) -> Result<QueryPattern> {
            if text.contains("population") {
                Ok(population_pattern(&["Travis"]))
            } else {
                Err(Error::Translation(format!("no intent in '{text}'")))
            }
        }
    }

    fn executor(dataset: Arc<ScriptedDataset>) -> QueryExecutor {
        let mut federator = DatasetFederator::new(
            PRIMARY_WITH_FALLBACK,
            Arc::new(BreakerRegistry::new(config::breaker(5))),
            Arc::new(NullMonitor),
        );
        federator.register_strategy(Arc::new(PrimaryWithFallback));
        federator.register_adapter(dataset);
        let cache = ResultCache::new(config::cache(Duration::from_secs(60), Duration::from_secs(30)));
        QueryExecutor::new(cache, Arc::new(federator))
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_is_served_from_cache() {
        let dataset = Arc::new(ScriptedDataset::new("census_db").with_rows(vec![county("Travis", "TX", 1)]));
        let executor = executor(dataset.clone());
        let pattern = population_pattern(&["Travis"]);

        let first = executor.execute_query(&pattern).await.unwrap();
        assert!(!first.metadata.cached);
        assert_eq!(first.metadata.sources, vec!["census_db"]);
        assert_eq!(first.metadata.confidence_level, 0.95);
        assert_eq!(first.row_count(), 1);

        let second = executor.execute_query(&pattern).await.unwrap();
        assert!(second.metadata.cached);
        assert!(!second.metadata.stale);
        assert_eq!(second.data, first.data);
        assert_eq!(second.metadata.strategy, PRIMARY_WITH_FALLBACK);
        assert_eq!(dataset.queries(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dataset = Arc::new(ScriptedDataset::new("census_db").with_script(vec![Err(Error::Source {
            source_id: "census_db".into(),
            reason: "locked".into(),
        })]));
        let executor = executor(dataset.clone());
        let pattern = population_pattern(&["Travis"]);

        assert!(executor.execute_query(&pattern).await.is_err());
        let ok = executor.execute_query(&pattern).await.unwrap();
        assert!(!ok.metadata.cached);
        assert_eq!(dataset.queries(), 2);
    }

    #[tokio::test]
    async fn ask_translates_first() {
        let dataset = Arc::new(ScriptedDataset::new("census_db").with_rows(vec![county("Travis", "TX", 1)]));
        let executor = executor(dataset).with_translator(Arc::new(KeywordTranslator));

        let response = executor.ask("population of travis county").await.unwrap();
        assert_eq!(response.row_count(), 1);

        let err = executor.ask("weather tomorrow").await.unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }

    #[tokio::test]
    async fn ask_without_translator_fails() {
        let executor = executor(Arc::new(ScriptedDataset::new("census_db")));
        let err = executor.ask("population").await.unwrap_err();
        assert!(matches!(err, Error::Translation(_)));
    }
}
