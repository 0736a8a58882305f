//! Bounded connection pool over an embedded engine.
//!
//! Connections move between two sets: idle and active. Acquisition prefers an
//! idle connection, then opens a new one while `total < max_connections`,
//! and otherwise queues the caller. Queued callers are served strictly in
//! arrival order, and a released connection is handed to the oldest waiter
//! before it can return to the idle set.
//!
//! A [`PooledConnection`] returns itself to the pool when dropped, so a
//! connection is released exactly once whatever happens to the caller.

mod state;


use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use self::state::{Grant, IdleSession, PoolState, SlotTicket, Waiter};
use crate::domain::Record;
use crate::error::{Error, PoolError, Result};
use crate::infrastructure::config::pool::PoolConfig;
use crate::port::outbound::engine::{Engine, EngineSession};
use crate::port::outbound::monitor::{OperationMonitor, OperationSpan};

/// Point-in-time pool counts.
///
/// `active + idle == total` and `total <= max_connections` at every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub waiting: usize,
    pub created: u64,
    pub closed: u64,
    pub acquired: u64,
    pub handoffs: u64,
    pub timeouts: u64,
}

pub(crate) struct PoolShared {
    name: String,
    config: PoolConfig,
    engine: Arc<dyn Engine>,
    monitor: Arc<dyn OperationMonitor>,
    state: parking_lot::Mutex<PoolState>,
}

/// A bounded pool of engine sessions. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

enum Plan {
    Ready(PooledConnection),
    Open(SlotTicket),
    Wait(u64, oneshot::Receiver<Grant>),
}

impl ConnectionPool {
    /// Create an empty pool. No connection is opened until first use or [`warm`](Self::warm).
    ///
    /// # Errors
    ///
    /// Returns a config error if the bounds or timeouts are invalid.
    pub fn new(
        config: PoolConfig,
        engine: Arc<dyn Engine>,
        monitor: Arc<dyn OperationMonitor>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                name: engine.name().to_string(),
                config,
                engine,
                monitor,
                state: parking_lot::Mutex::new(PoolState::default()),
            }),
        })
    }

    /// Dependency label used in logs and monitoring.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Borrow a connection, waiting up to the acquire timeout.
    ///
    /// # Errors
    ///
    /// - [`PoolError::AcquireTimeout`] if no connection became available in time
    /// - [`PoolError::Closing`] if the pool is closed or closes while waiting
    /// - [`PoolError::Connect`] if a new session could not be opened
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let span = OperationSpan::start(
            self.shared.monitor.as_ref(),
            "pool.acquire",
            &self.shared.name,
            "",
        );
        let result = self.acquire_inner().await;
        span.finish(&result);
        result
    }

    async fn acquire_inner(&self) -> Result<PooledConnection> {
        let started = Instant::now();
        let plan = self.plan_acquire()?;

        match plan {
            Plan::Ready(conn) => Ok(conn),
            Plan::Open(ticket) => self.shared.open_reserved(ticket).await,
            Plan::Wait(waiter_id, rx) => {
                let deadline = started + self.shared.config.acquire_timeout();
                let outcome = tokio::time::timeout_at(deadline, rx).await;
                match outcome {
                    Ok(Ok(Grant::Connection(conn))) => Ok(conn),
                    Ok(Ok(Grant::Slot(ticket))) => self.shared.open_reserved(ticket).await,
                    // Sender dropped: the pool closed while we waited.
                    Ok(Err(_)) => Err(PoolError::Closing.into()),
                    Err(_) => {
                        let waited = started.elapsed();
                        {
                            let mut state = self.shared.state.lock();
                            state.remove_waiter(waiter_id);
                            state.counters.timeouts += 1;
                        }
                        warn!(
                            pool = %self.shared.name,
                            waited_ms = waited.as_millis() as u64,
                            "Timed out waiting for a connection"
                        );
                        Err(PoolError::AcquireTimeout { waited }.into())
                    }
                }
            }
        }
    }

    fn plan_acquire(&self) -> Result<Plan> {
        let mut state = self.shared.state.lock();
        if state.closing {
            return Err(PoolError::Closing.into());
        }

        if let Some(idle) = state.idle.pop_back() {
            state.active.insert(idle.id, Arc::clone(&idle.session));
            state.counters.acquired += 1;
            return Ok(Plan::Ready(PooledConnection::new(
                idle.id,
                idle.session,
                Arc::downgrade(&self.shared),
            )));
        }

        if state.total() < self.shared.config.max_connections {
            state.reserved += 1;
            return Ok(Plan::Open(SlotTicket::new(Arc::downgrade(&self.shared))));
        }

        let (tx, rx) = oneshot::channel();
        let id = state.next_waiter_id();
        state.waiters.push_back(Waiter {
            id,
            tx,
            enqueued_at: Instant::now(),
        });
        debug!(pool = %self.shared.name, waiting = state.waiters.len(), "Pool exhausted, queued");
        Ok(Plan::Wait(id, rx))
    }

    /// Return a connection to the pool.
    ///
    /// Equivalent to dropping it; provided for call sites that want the
    /// release to be explicit.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Acquire, run one statement, and release, even when the statement fails.
    ///
    /// # Errors
    ///
    /// Any acquisition error, or [`PoolError::Query`] from the engine.
    pub async fn query(&self, sql: &str, params: &BTreeMap<String, Value>) -> Result<Vec<Record>> {
        let conn = self.acquire().await?;
        let result = conn.execute(sql, params).await;
        self.release(conn);
        result
    }

    /// Open connections until at least `min_connections` exist.
    ///
    /// Returns the number of connections opened.
    ///
    /// # Errors
    ///
    /// The first acquisition error; connections opened before it stay pooled.
    pub async fn warm(&self) -> Result<usize> {
        let missing = {
            let state = self.shared.state.lock();
            self.shared.config.min_connections.saturating_sub(state.total())
        };
        let mut held = Vec::with_capacity(missing);
        for _ in 0..missing {
            held.push(self.acquire().await?);
        }
        let opened = held.len();
        drop(held);
        if opened > 0 {
            info!(pool = %self.shared.name, opened, "Pool warmed");
        }
        Ok(opened)
    }

    /// Acquire a connection and ping it.
    pub async fn health_check(&self) -> bool {
        let span = OperationSpan::start(
            self.shared.monitor.as_ref(),
            "pool.health_check",
            &self.shared.name,
            "",
        );
        let result = match self.acquire().await {
            Ok(conn) => conn.ping().await,
            Err(e) => Err(e),
        };
        span.finish(&result);
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(pool = %self.shared.name, error = %e, "Pool health check failed");
                false
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        let idle = state.idle.len();
        let active = state.active.len() + state.reserved;
        PoolStats {
            total: idle + active,
            active,
            idle,
            waiting: state.live_waiters(),
            created: state.counters.created,
            closed: state.counters.closed,
            acquired: state.counters.acquired,
            handoffs: state.counters.handoffs,
            timeouts: state.counters.timeouts,
        }
    }

    /// Shut the pool down.
    ///
    /// Every queued caller fails with [`PoolError::Closing`], every open
    /// session is closed (failures are logged, not raised) and the counts
    /// reset to zero. Calling `close` again is a no-op. Handles still held
    /// by callers stay usable until dropped but are not returned to the pool.
    pub async fn close(&self) {
        let (sessions, waiters) = {
            let mut state = self.shared.state.lock();
            if state.closing {
                return;
            }
            state.closing = true;
            let waiters: Vec<Waiter> = state.waiters.drain(..).collect();
            let mut sessions: Vec<Arc<dyn EngineSession>> =
                state.idle.drain(..).map(|idle| idle.session).collect();
            sessions.extend(state.active.drain().map(|(_, session)| session));
            state.counters.closed += sessions.len() as u64;
            (sessions, waiters)
        };

        let rejected = waiters.len();
        drop(waiters);

        let mut failures = 0usize;
        for session in &sessions {
            if let Err(e) = session.close().await {
                failures += 1;
                warn!(pool = %self.shared.name, error = %e, "Failed to close engine session");
            }
        }
        info!(
            pool = %self.shared.name,
            closed = sessions.len(),
            failures,
            rejected,
            "Connection pool closed"
        );
    }
}

impl PoolShared {
    /// Open a session in a slot already counted in `reserved`.
    async fn open_reserved(self: &Arc<Self>, ticket: SlotTicket) -> Result<PooledConnection> {
        let started = Instant::now();
        let opened = tokio::time::timeout(self.config.connect_timeout(), self.engine.open()).await;

        let opened = match opened {
            Ok(Ok(opened)) => opened,
            Ok(Err(e)) => {
                warn!(pool = %self.name, error = %e, "Failed to open engine session");
                drop(ticket);
                return Err(match e {
                    Error::Pool(pool_err) => pool_err.into(),
                    other => PoolError::Connect(other.to_string()).into(),
                });
            }
            Err(_) => {
                warn!(pool = %self.name, "Opening engine session timed out");
                drop(ticket);
                return Err(PoolError::AcquireTimeout {
                    waited: started.elapsed(),
                }
                .into());
            }
        };

        for warning in &opened.warnings {
            warn!(pool = %self.name, warning = %warning, "Engine setup statement failed");
        }
        let session: Arc<dyn EngineSession> = Arc::from(opened.session);

        let registered = {
            let mut state = self.state.lock();
            state.reserved = state.reserved.saturating_sub(1);
            ticket.disarm();
            if state.closing {
                None
            } else {
                let id = state.next_session_id();
                state.active.insert(id, Arc::clone(&session));
                state.counters.created += 1;
                state.counters.acquired += 1;
                debug!(pool = %self.name, session = id, total = state.total(), "Opened engine session");
                Some(id)
            }
        };

        let Some(id) = registered else {
            if let Err(e) = session.close().await {
                warn!(pool = %self.name, error = %e, "Failed to close engine session");
            }
            return Err(PoolError::Closing.into());
        };
        Ok(PooledConnection::new(id, session, Arc::downgrade(self)))
    }

    /// Give back a reserved slot whose open did not produce a connection.
    ///
    /// The slot passes to the oldest live waiter, which then opens its own
    /// connection; otherwise capacity simply frees up.
    pub(super) fn abandon_slot(self: &Arc<Self>) {
        let mut state = self.state.lock();
        state.reserved = state.reserved.saturating_sub(1);
        if state.closing {
            return;
        }
        while let Some(waiter) = state.waiters.pop_front() {
            state.reserved += 1;
            let ticket = SlotTicket::new(Arc::downgrade(self));
            match waiter.tx.send(Grant::Slot(ticket)) {
                Ok(()) => return,
                Err(grant) => {
                    state.reserved -= 1;
                    if let Grant::Slot(ticket) = grant {
                        ticket.disarm();
                    }
                }
            }
        }
    }

    /// Return a released session: hand it to a waiter, or park it as idle.
    fn check_in(self: &Arc<Self>, id: u64, session: Arc<dyn EngineSession>) {
        let excess = {
            let mut state = self.state.lock();
            if state.active.remove(&id).is_none() {
                // Pool was closed while this connection was out; the session
                // has already been closed.
                return;
            }

            let mut session = session;
            while let Some(waiter) = state.waiters.pop_front() {
                state.active.insert(id, Arc::clone(&session));
                let handle = PooledConnection::new(id, session, Arc::downgrade(self));
                match waiter.tx.send(Grant::Connection(handle)) {
                    Ok(()) => {
                        state.counters.handoffs += 1;
                        state.counters.acquired += 1;
                        debug!(
                            pool = %self.name,
                            session = id,
                            queued_ms = waiter.enqueued_at.elapsed().as_millis() as u64,
                            "Handed connection to waiter"
                        );
                        return;
                    }
                    Err(grant) => {
                        state.active.remove(&id);
                        session = match grant {
                            Grant::Connection(handle) => match handle.into_session() {
                                Some(session) => session,
                                None => return,
                            },
                            Grant::Slot(ticket) => {
                                ticket.disarm();
                                return;
                            }
                        };
                    }
                }
            }

            state.idle.push_back(IdleSession {
                id,
                session,
                idle_since: Instant::now(),
            });
            if state.idle.len() > self.config.min_connections {
                state.counters.closed += 1;
                state.idle.pop_front()
            } else {
                None
            }
        };

        if let Some(idle) = excess {
            debug!(
                pool = %self.name,
                session = idle.id,
                idle_ms = idle.idle_since.elapsed().as_millis() as u64,
                "Closing excess idle connection"
            );
            self.spawn_close(idle.session);
        }
    }

    fn spawn_close(&self, session: Arc<dyn EngineSession>) {
        let name = self.name.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(pool = %name, error = %e, "Failed to close engine session");
                    }
                });
            }
            Err(_) => {
                debug!(pool = %name, "No runtime available, dropping session without close");
            }
        }
    }
}

/// A borrowed engine session.
///
/// Dropping the handle returns the session to its pool.
pub struct PooledConnection {
    id: u64,
    session: Option<Arc<dyn EngineSession>>,
    pool: Weak<PoolShared>,
    acquired_at: Instant,
}

impl PooledConnection {
    fn new(id: u64, session: Arc<dyn EngineSession>, pool: Weak<PoolShared>) -> Self {
        Self {
            id,
            session: Some(session),
            pool,
            acquired_at: Instant::now(),
        }
    }

    /// Pool-assigned session id, stable for the life of the session.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Time since this handle was issued.
    #[must_use]
    pub fn held_for(&self) -> std::time::Duration {
        self.acquired_at.elapsed()
    }

    fn session(&self) -> Result<&Arc<dyn EngineSession>> {
        self.session
            .as_ref()
            .ok_or_else(|| PoolError::Closing.into())
    }

    /// Run a statement on this session.
    pub async fn execute(&self, sql: &str, params: &BTreeMap<String, Value>) -> Result<Vec<Record>> {
        self.session()?.execute(sql, params).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.session()?.ping().await
    }

    /// Detach the session without returning it to the pool.
    fn into_session(mut self) -> Option<Arc<dyn EngineSession>> {
        self.session.take()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if let Some(pool) = self.pool.upgrade() {
            pool.check_in(self.id, session);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("held_for", &self.held_for())
            .finish()
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.shared.name)
            .field("stats", &self.stats())
            .finish()
    }
}
