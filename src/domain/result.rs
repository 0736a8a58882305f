//! Result types carrying data plus provenance.

use serde::{Deserialize, Serialize};

use super::record::Record;

/// Provenance of a federated execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationMetadata {
    /// Sources whose data made it into the result.
    pub sources: Vec<String>,
    /// Every source the strategy tried, in attempt order.
    pub sources_attempted: Vec<String>,
    /// Confidence in the result, between 0.0 and 1.0.
    pub confidence_level: f64,
    /// Name of the strategy that produced the result.
    pub strategy: String,
    pub execution_time_ms: u64,
}

/// Records produced by the federator together with their provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedResult {
    pub data: Vec<Record>,
    pub metadata: FederationMetadata,
}

/// Metadata returned to callers of the query service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// True when served from the result cache.
    pub cached: bool,
    /// True when the cached copy was past its TTL but inside the stale window.
    pub stale: bool,
    pub sources: Vec<String>,
    pub sources_attempted: Vec<String>,
    pub confidence_level: f64,
    pub strategy: String,
    /// Wall time of this call, including cache lookup.
    pub execution_time_ms: u64,
}

/// Response returned by [`QueryService::execute_query`](crate::port::inbound::query::QueryService::execute_query).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<Record>,
    pub metadata: ResponseMetadata,
}

impl QueryResponse {
    /// Number of rows in the response.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.len()
    }
}
