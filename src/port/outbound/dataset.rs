//! Dataset adapter port.
//!
//! Every data source the federator can draw from implements
//! [`DatasetAdapter`]. Exactly one registered adapter is normally marked
//! [`SourceRole::Primary`]; the rest are fallbacks tried in registration
//! order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{QueryPattern, Record};
use crate::error::Result;

/// Role of a source within the federation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    Primary,
    #[default]
    Fallback,
}

impl SourceRole {
    /// Confidence weight applied to results from a source in this role.
    #[must_use]
    pub fn confidence(self) -> f64 {
        match self {
            Self::Primary => PRIMARY_CONFIDENCE,
            Self::Fallback => FALLBACK_CONFIDENCE,
        }
    }
}

/// Confidence assigned to data from the primary source.
pub const PRIMARY_CONFIDENCE: f64 = 0.95;

/// Confidence assigned to data from any other source.
pub const FALLBACK_CONFIDENCE: f64 = 0.85;

/// Capability interface implemented by each data source.
#[async_trait]
pub trait DatasetAdapter: Send + Sync {
    /// Stable identifier reported in provenance metadata.
    fn source_id(&self) -> &str;

    fn role(&self) -> SourceRole {
        SourceRole::Fallback
    }

    /// Prepare the source for queries (open files, warm pools).
    async fn connect(&self) -> Result<()>;

    /// Fetch raw records answering `pattern`.
    async fn query(&self, pattern: &QueryPattern) -> Result<Vec<Record>>;

    /// Reshape raw records into the federation's common form.
    fn transform_results(&self, records: Vec<Record>) -> Vec<Record> {
        records
    }

    async fn health_check(&self) -> bool;

    async fn disconnect(&self) -> Result<()>;
}
