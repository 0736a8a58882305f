//! Query entry points consumed by the (external) HTTP layer.

use async_trait::async_trait;

use crate::domain::{QueryPattern, QueryResponse};
use crate::error::Result;

/// Natural-language translator.
///
/// Implemented outside this crate (keyword matching, not ML). The core never
/// parses natural language itself.
#[async_trait]
pub trait QueryTranslator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<QueryPattern>;
}

/// In-process query API.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Execute an already translated pattern.
    ///
    /// # Errors
    ///
    /// User-visible failures are `AcquireTimeout`, `AllSourcesFailed` and
    /// `CircuitOpen`.
    async fn execute_query(&self, pattern: &QueryPattern) -> Result<QueryResponse>;

    /// Translate `text` and execute the resulting pattern.
    async fn ask(&self, text: &str) -> Result<QueryResponse>;
}
