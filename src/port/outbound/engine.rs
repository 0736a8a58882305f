//! Embedded analytical engine port.
//!
//! The connection pool only needs to open sessions, run statements on them,
//! ping them and close them. Engine-specific tuning happens inside
//! [`Engine::open`], once per new session.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Record;
use crate::error::Result;

/// One live session on the engine.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Run `sql` with named parameters and return every row.
    ///
    /// Engine rejections are reported as [`PoolError::Query`](crate::error::PoolError::Query).
    async fn execute(&self, sql: &str, params: &BTreeMap<String, Value>) -> Result<Vec<Record>>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Release engine resources held by this session.
    async fn close(&self) -> Result<()>;
}

/// A freshly opened session and the non-fatal setup warnings it produced.
pub struct OpenedSession {
    pub session: Box<dyn EngineSession>,
    /// Setup statements that failed without making the session unusable
    /// (for example settings that were already applied).
    pub warnings: Vec<String>,
}

/// Factory for engine sessions.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name used as the dependency label in logs and monitoring.
    fn name(&self) -> &str;

    /// Open and tune a new session.
    async fn open(&self) -> Result<OpenedSession>;
}
