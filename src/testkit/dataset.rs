//! Scripted dataset adapter for federation tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{QueryPattern, Record};
use crate::error::{Error, Result};
use crate::port::outbound::dataset::{DatasetAdapter, SourceRole};

#[derive(Default)]
struct Calls {
    queries: AtomicU32,
    connects: AtomicU32,
    disconnects: AtomicU32,
}

/// Adapter with pre-loaded query results.
///
/// Each `query()` pops the next scripted result; once the script is
/// exhausted it fails with the configured reason, or returns the default
/// rows.
pub struct ScriptedDataset {
    id: String,
    role: SourceRole,
    rows: Vec<Record>,
    failure: Option<String>,
    script: Mutex<VecDeque<Result<Vec<Record>>>>,
    delay: Duration,
    healthy: AtomicBool,
    calls: Arc<Calls>,
}

impl ScriptedDataset {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            role: SourceRole::Fallback,
            rows: Vec::new(),
            failure: None,
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            healthy: AtomicBool::new(true),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn primary(mut self) -> Self {
        self.role = SourceRole::Primary;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    /// Fail every unscripted query with `reason`.
    pub fn failing(mut self, reason: &str) -> Self {
        self.failure = Some(reason.to_string());
        self
    }

    pub fn with_script(self, results: Vec<Result<Vec<Record>>>) -> Self {
        *self.script.lock() = results.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn queries(&self) -> u32 {
        self.calls.queries.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> u32 {
        self.calls.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.calls.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetAdapter for ScriptedDataset {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> SourceRole {
        self.role
    }

    async fn connect(&self) -> Result<()> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, _pattern: &QueryPattern) -> Result<Vec<Record>> {
        self.calls.queries.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        match &self.failure {
            Some(reason) => Err(Error::Source {
                source_id: self.id.clone(),
                reason: reason.clone(),
            }),
            None => Ok(self.rows.clone()),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
