//! In-memory engine for pool and adapter tests.
//!
//! [`MemoryEngine`] hands out sessions that return a fixed row set. Every
//! open, query and close is counted, and opens, queries and closes can be
//! delayed or made to fail.
//!
//! A statement containing `FAIL` is rejected with
//! [`PoolError::Query`](crate::error::PoolError::Query).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::Record;
use crate::error::{Error, PoolError, Result};
use crate::port::outbound::engine::{Engine, EngineSession, OpenedSession};

#[derive(Default)]
struct Counters {
    opened: AtomicU32,
    closed: AtomicU32,
    queries: AtomicU32,
}

/// Engine whose sessions live entirely in memory.
pub struct MemoryEngine {
    name: String,
    rows: Vec<Record>,
    warnings: Vec<String>,
    open_delay: Duration,
    query_delay: Duration,
    fail_open: AtomicBool,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            name: "memory".to_string(),
            rows: Vec::new(),
            warnings: Vec::new(),
            open_delay: Duration::ZERO,
            query_delay: Duration::ZERO,
            fail_open: AtomicBool::new(false),
            fail_close: false,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    /// Report these setup warnings from every open.
    pub fn with_warnings(mut self, warnings: &[&str]) -> Self {
        self.warnings = warnings.iter().map(|w| (*w).to_string()).collect();
        self
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    /// Make every session close report an error.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Toggle open failures at runtime.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> u32 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> u32 {
        self.counters.queries.load(Ordering::SeqCst)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<OpenedSession> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PoolError::Connect("memory engine unavailable".into()).into());
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(OpenedSession {
            session: Box::new(MemorySession {
                rows: self.rows.clone(),
                query_delay: self.query_delay,
                fail_close: self.fail_close,
                counters: Arc::clone(&self.counters),
            }),
            warnings: self.warnings.clone(),
        })
    }
}

struct MemorySession {
    rows: Vec<Record>,
    query_delay: Duration,
    fail_close: bool,
    counters: Arc<Counters>,
}

#[async_trait]
impl EngineSession for MemorySession {
    async fn execute(&self, sql: &str, _params: &BTreeMap<String, Value>) -> Result<Vec<Record>> {
        self.counters.queries.fetch_add(1, Ordering::SeqCst);
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        if sql.contains("FAIL") {
            return Err(PoolError::Query(format!("syntax error near \"FAIL\" in: {sql}")).into());
        }
        Ok(self.rows.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(Error::Io(std::io::Error::other("session close failed")));
        }
        Ok(())
    }
}
