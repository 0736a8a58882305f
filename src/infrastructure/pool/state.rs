//! Connection pool internal state types.
//!
//! Everything here is guarded by the pool's single state mutex; no method
//! in this module awaits.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{PoolShared, PooledConnection};
use crate::port::outbound::engine::EngineSession;

/// An idle engine session waiting in the pool.
pub(super) struct IdleSession {
    pub(super) id: u64,
    pub(super) session: Arc<dyn EngineSession>,
    pub(super) idle_since: Instant,
}

/// What a queued waiter receives.
pub(super) enum Grant {
    /// A released connection handed over directly; it stays Active.
    Connection(PooledConnection),
    /// Permission to open a new connection in a slot freed by a failed open.
    Slot(SlotTicket),
}

/// A FIFO entry for a caller blocked in `acquire`.
pub(super) struct Waiter {
    pub(super) id: u64,
    pub(super) tx: oneshot::Sender<Grant>,
    pub(super) enqueued_at: Instant,
}

/// A reserved slot for a connection being opened.
///
/// Dropping an armed ticket gives the slot back to the pool, so a slot is
/// never lost when an open fails, times out, or its future is cancelled.
pub(super) struct SlotTicket {
    pool: Weak<PoolShared>,
    armed: bool,
}

impl SlotTicket {
    pub(super) fn new(pool: Weak<PoolShared>) -> Self {
        Self { pool, armed: true }
    }

    /// Consume the ticket without releasing the slot.
    pub(super) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotTicket {
    fn drop(&mut self) {
        if self.armed {
            if let Some(pool) = self.pool.upgrade() {
                pool.abandon_slot();
            }
        }
    }
}

/// Lifetime counters exposed through `PoolStats`.
#[derive(Debug, Default, Clone, Copy)]
pub(super) struct Counters {
    pub(super) created: u64,
    pub(super) closed: u64,
    pub(super) acquired: u64,
    pub(super) handoffs: u64,
    pub(super) timeouts: u64,
}

/// Mutable pool state.
///
/// `total = idle + active + reserved` never exceeds `max_connections`.
#[derive(Default)]
pub(super) struct PoolState {
    pub(super) idle: VecDeque<IdleSession>,
    pub(super) active: HashMap<u64, Arc<dyn EngineSession>>,
    /// Slots held by callers currently opening a connection.
    pub(super) reserved: usize,
    pub(super) waiters: VecDeque<Waiter>,
    pub(super) closing: bool,
    pub(super) next_session_id: u64,
    pub(super) next_waiter_id: u64,
    pub(super) counters: Counters,
}

impl PoolState {
    pub(super) fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.reserved
    }

    /// Waiters whose caller is still listening.
    pub(super) fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|w| !w.tx.is_closed()).count()
    }

    pub(super) fn next_session_id(&mut self) -> u64 {
        self.next_session_id += 1;
        self.next_session_id
    }

    pub(super) fn next_waiter_id(&mut self) -> u64 {
        self.next_waiter_id += 1;
        self.next_waiter_id
    }

    pub(super) fn remove_waiter(&mut self, id: u64) -> bool {
        let before = self.waiters.len();
        self.waiters.retain(|w| w.id != id);
        self.waiters.len() != before
    }
}
