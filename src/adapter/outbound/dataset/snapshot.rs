//! JSON snapshot dataset adapter.
//!
//! Loads a file holding a JSON array of records and answers patterns by
//! filtering on the pattern's geography entities. Intended as a fallback
//! when the engine-backed primary is unavailable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::{matches_geography, QueryPattern, Record};
use crate::error::{Error, Result};
use crate::port::outbound::dataset::{DatasetAdapter, SourceRole};

pub struct SnapshotDataset {
    id: String,
    role: SourceRole,
    path: PathBuf,
    records: RwLock<Option<Arc<Vec<Record>>>>,
}

impl SnapshotDataset {
    #[must_use]
    pub fn new(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            id: id.into(),
            role: SourceRole::Fallback,
            path: path.as_ref().to_path_buf(),
            records: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: SourceRole) -> Self {
        self.role = role;
        self
    }

    fn failure(&self, reason: String) -> Error {
        Error::Source {
            source_id: self.id.clone(),
            reason,
        }
    }

    async fn load(&self) -> Result<Arc<Vec<Record>>> {
        let cached = self.records.read().clone();
        if let Some(records) = cached {
            return Ok(records);
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.failure(format!("cannot read {}: {e}", self.path.display())))?;
        let records: Vec<Record> = serde_json::from_str(&content)
            .map_err(|e| self.failure(format!("invalid snapshot {}: {e}", self.path.display())))?;
        debug!(source = %self.id, records = records.len(), "Loaded snapshot");

        let records = Arc::new(records);
        *self.records.write() = Some(Arc::clone(&records));
        Ok(records)
    }
}

#[async_trait]
impl DatasetAdapter for SnapshotDataset {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    async fn connect(&self) -> Result<()> {
        self.load().await.map(|_| ())
    }

    async fn query(&self, pattern: &QueryPattern) -> Result<Vec<Record>> {
        let records = self.load().await?;
        Ok(records
            .iter()
            .filter(|record| matches_geography(record, &pattern.entities.geography))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> bool {
        let loaded = self.records.read().is_some();
        loaded || tokio::fs::metadata(&self.path).await.is_ok()
    }

    async fn disconnect(&self) -> Result<()> {
        *self.records.write() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::testkit::domain::{national_pattern, population_pattern};

    fn snapshot_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const COUNTIES: &str = r#"[
        {"county": "Travis", "state": "TX", "population": 1290188},
        {"county": "Harris", "state": "TX", "population": 4731145},
        {"county": "King", "state": "WA", "population": 2269675},
        {"county": "Lane", "state": "OR", "population": 382971}
    ]"#;

    #[tokio::test]
    async fn filters_by_geography() {
        let file = snapshot_file(COUNTIES);
        let dataset = SnapshotDataset::new("acs_snapshot", file.path());

        let rows = dataset.query(&population_pattern(&["travis"])).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["population"], json!(1_290_188));

        let all = dataset.query(&national_pattern()).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn qualified_county_returns_only_that_county() {
        let file = snapshot_file(COUNTIES);
        let dataset = SnapshotDataset::new("acs_snapshot", file.path());

        let rows = dataset.query(&population_pattern(&["Travis County, TX"])).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["county"], json!("Travis"));

        let rows = dataset.query(&population_pattern(&["Orange"])).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let dataset = SnapshotDataset::new("acs_snapshot", "/nonexistent/acs.json");
        assert!(!dataset.health_check().await);
        let err = dataset.connect().await.unwrap_err();
        match err {
            Error::Source { source_id, reason } => {
                assert_eq!(source_id, "acs_snapshot");
                assert!(reason.contains("cannot read"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_a_source_error() {
        let file = snapshot_file("{not json");
        let dataset = SnapshotDataset::new("acs_snapshot", file.path());
        let err = dataset.query(&national_pattern()).await.unwrap_err();
        assert!(err.to_string().contains("invalid snapshot"));
    }

    #[tokio::test]
    async fn disconnect_forgets_loaded_records() {
        let file = snapshot_file(COUNTIES);
        let dataset = SnapshotDataset::new("acs_snapshot", file.path());
        dataset.connect().await.unwrap();
        dataset.disconnect().await.unwrap();
        assert!(dataset.records.read().is_none());
        assert!(dataset.health_check().await);
    }
}
