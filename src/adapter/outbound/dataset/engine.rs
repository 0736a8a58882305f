//! Engine-backed dataset adapter.

use async_trait::async_trait;

use crate::domain::{snake_case, QueryPattern, Record};
use crate::error::Result;
use crate::infrastructure::pool::ConnectionPool;
use crate::port::outbound::dataset::{DatasetAdapter, SourceRole};

/// Dataset served by SQL over a [`ConnectionPool`].
///
/// Column names are normalized to lowercase snake case so records from
/// this source join cleanly with other sources.
pub struct EngineDataset {
    id: String,
    role: SourceRole,
    pool: ConnectionPool,
}

impl EngineDataset {
    #[must_use]
    pub fn new(id: impl Into<String>, pool: ConnectionPool) -> Self {
        Self {
            id: id.into(),
            role: SourceRole::Fallback,
            pool,
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: SourceRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

#[async_trait]
impl DatasetAdapter for EngineDataset {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    async fn connect(&self) -> Result<()> {
        self.pool.warm().await.map(|_| ())
    }

    async fn query(&self, pattern: &QueryPattern) -> Result<Vec<Record>> {
        self.pool.query(&pattern.query_text, &pattern.parameters).await
    }

    fn transform_results(&self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(column, value)| (snake_case(&column), value))
                    .collect()
            })
            .collect()
    }

    async fn health_check(&self) -> bool {
        self.pool.health_check().await
    }

    async fn disconnect(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
