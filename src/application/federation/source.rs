//! Registered sources: each adapter bound to its breaker and the monitor.

use std::sync::Arc;

use crate::domain::{QueryPattern, Record};
use crate::error::Result;
use crate::infrastructure::breaker::CircuitBreaker;
use crate::port::outbound::dataset::{DatasetAdapter, SourceRole, FALLBACK_CONFIDENCE, PRIMARY_CONFIDENCE};
use crate::port::outbound::monitor::{OperationMonitor, OperationSpan};

/// A dataset adapter wrapped in its own circuit breaker.
pub struct BoundSource {
    adapter: Arc<dyn DatasetAdapter>,
    breaker: Arc<CircuitBreaker>,
    monitor: Arc<dyn OperationMonitor>,
}

impl BoundSource {
    pub(crate) fn new(
        adapter: Arc<dyn DatasetAdapter>,
        breaker: Arc<CircuitBreaker>,
        monitor: Arc<dyn OperationMonitor>,
    ) -> Self {
        Self {
            adapter,
            breaker,
            monitor,
        }
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        self.adapter.source_id()
    }

    #[must_use]
    pub fn role(&self) -> SourceRole {
        self.adapter.role()
    }

    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn DatasetAdapter> {
        &self.adapter
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Query the adapter through its breaker and normalize the records.
    ///
    /// # Errors
    ///
    /// [`Error::CircuitOpen`](crate::error::Error::CircuitOpen) while the
    /// breaker is open, otherwise the adapter's own error.
    pub async fn fetch(&self, pattern: &QueryPattern) -> Result<Vec<Record>> {
        let span = OperationSpan::start(
            self.monitor.as_ref(),
            "adapter.query",
            self.source_id(),
            &pattern.intent,
        );
        let result = self
            .breaker
            .execute(|| async {
                let raw = self.adapter.query(pattern).await?;
                Ok(self.adapter.transform_results(raw))
            })
            .await;
        span.finish(&result);
        result
    }
}

/// Sources in registration order, with the primary resolved.
///
/// The primary is the first source whose role is
/// [`SourceRole::Primary`], or the first registered source when none is.
#[derive(Default)]
pub struct SourceSet {
    sources: Vec<Arc<BoundSource>>,
}

impl SourceSet {
    pub(crate) fn push(&mut self, source: Arc<BoundSource>) {
        self.sources.push(source);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BoundSource>> {
        self.sources.iter()
    }

    #[must_use]
    pub fn primary_index(&self) -> Option<usize> {
        self.sources
            .iter()
            .position(|s| s.role() == SourceRole::Primary)
            .or_else(|| (!self.sources.is_empty()).then_some(0))
    }

    #[must_use]
    pub fn is_primary(&self, index: usize) -> bool {
        self.primary_index() == Some(index)
    }

    /// Confidence weight of the source at `index`.
    #[must_use]
    pub fn weight(&self, index: usize) -> f64 {
        if self.is_primary(index) {
            PRIMARY_CONFIDENCE
        } else {
            FALLBACK_CONFIDENCE
        }
    }

    /// Primary first, then the rest in registration order, with their indices.
    #[must_use]
    pub fn fallback_order(&self) -> Vec<(usize, &Arc<BoundSource>)> {
        let primary = self.primary_index();
        let mut ordered: Vec<_> = primary
            .map(|i| (i, &self.sources[i]))
            .into_iter()
            .collect();
        ordered.extend(
            self.sources
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != primary),
        );
        ordered
    }
}
