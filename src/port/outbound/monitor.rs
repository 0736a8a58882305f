//! Monitoring sink port.
//!
//! The core reports every pool acquisition, adapter call and federation
//! execution as a start/complete pair. Storage and aggregation of those
//! operations belong to the sink, not to the core.

use std::fmt;
use std::time::Instant;

use dashmap::DashMap;
use uuid::Uuid;

/// Correlation id linking a start to its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(Uuid);

impl OperationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiver of operation lifecycle reports.
///
/// Implementations must be cheap and non-blocking; they are called inline on
/// the query path.
pub trait OperationMonitor: Send + Sync {
    /// Record the start of `name` against `dependency`.
    fn start_operation(&self, name: &str, dependency: &str, detail: &str) -> OperationId;

    /// Record completion of a previously started operation.
    fn complete_operation(&self, id: OperationId, success: bool, error: Option<&str>);
}

/// Completion outcome reported for an operation dropped before it finished.
pub const CANCELLED: &str = "cancelled";

/// A started operation that reports its completion exactly once.
///
/// Dropping the span without calling [`OperationSpan::finish`] reports the
/// operation as failed with [`CANCELLED`], so a caller abandoning an
/// `acquire` or `fetch` mid-flight never leaves it open in the sink.
#[must_use = "dropping the span reports the operation as cancelled"]
pub struct OperationSpan<'a> {
    monitor: &'a dyn OperationMonitor,
    id: Option<OperationId>,
}

impl<'a> OperationSpan<'a> {
    pub fn start(monitor: &'a dyn OperationMonitor, name: &str, dependency: &str, detail: &str) -> Self {
        let id = monitor.start_operation(name, dependency, detail);
        Self { monitor, id: Some(id) }
    }

    /// Report the outcome of `result`.
    pub fn finish<T, E: fmt::Display>(mut self, result: &Result<T, E>) {
        let Some(id) = self.id.take() else { return };
        match result {
            Ok(_) => self.monitor.complete_operation(id, true, None),
            Err(e) => {
                let msg = e.to_string();
                self.monitor.complete_operation(id, false, Some(&msg));
            }
        }
    }
}

impl Drop for OperationSpan<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.monitor.complete_operation(id, false, Some(CANCELLED));
        }
    }
}

/// Monitor that discards everything.
pub struct NullMonitor;

impl OperationMonitor for NullMonitor {
    fn start_operation(&self, _name: &str, _dependency: &str, _detail: &str) -> OperationId {
        OperationId::new()
    }

    fn complete_operation(&self, _id: OperationId, _success: bool, _error: Option<&str>) {}
}

struct InFlight {
    name: String,
    dependency: String,
    started: Instant,
}

/// Monitor that reports operations through `tracing`.
///
/// Completions are logged with their elapsed time; failures at `warn`.
#[derive(Default)]
pub struct TracingMonitor {
    in_flight: DashMap<OperationId, InFlight>,
}

impl TracingMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations started but not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl OperationMonitor for TracingMonitor {
    fn start_operation(&self, name: &str, dependency: &str, detail: &str) -> OperationId {
        let id = OperationId::new();
        tracing::debug!(operation = %id, name, dependency, detail, "Operation started");
        self.in_flight.insert(
            id,
            InFlight {
                name: name.to_string(),
                dependency: dependency.to_string(),
                started: Instant::now(),
            },
        );
        id
    }

    fn complete_operation(&self, id: OperationId, success: bool, error: Option<&str>) {
        let Some((_, op)) = self.in_flight.remove(&id) else {
            tracing::debug!(operation = %id, "Completion for unknown operation");
            return;
        };
        let elapsed_ms = op.started.elapsed().as_millis() as u64;
        if success {
            tracing::debug!(
                operation = %id,
                name = %op.name,
                dependency = %op.dependency,
                elapsed_ms,
                "Operation completed"
            );
        } else {
            tracing::warn!(
                operation = %id,
                name = %op.name,
                dependency = %op.dependency,
                elapsed_ms,
                error = error.unwrap_or("unknown"),
                "Operation failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_monitor_tracks_in_flight() {
        let monitor = TracingMonitor::new();
        let a = monitor.start_operation("pool.acquire", "engine", "");
        let b = monitor.start_operation("adapter.query", "census_db", "population");
        assert_eq!(monitor.in_flight(), 2);

        monitor.complete_operation(a, true, None);
        monitor.complete_operation(b, false, Some("locked"));
        assert_eq!(monitor.in_flight(), 0);

        // Completing twice is harmless.
        monitor.complete_operation(a, true, None);
    }

    #[test]
    fn dropped_span_completes_as_cancelled() {
        let monitor = TracingMonitor::new();
        let span = OperationSpan::start(&monitor, "adapter.query", "census_db", "population");
        assert_eq!(monitor.in_flight(), 1);
        drop(span);
        assert_eq!(monitor.in_flight(), 0);

        let span = OperationSpan::start(&monitor, "pool.acquire", "engine", "");
        span.finish(&Ok::<_, String>(()));
        assert_eq!(monitor.in_flight(), 0);
    }

    #[tokio::test]
    async fn cancelled_future_does_not_leak_in_flight_entry() {
        let monitor = TracingMonitor::new();
        let work = async {
            let span = OperationSpan::start(&monitor, "adapter.query", "census_db", "");
            let result: Result<(), String> = std::future::pending().await;
            span.finish(&result);
        };
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(1), work).await;
        assert!(timed_out.is_err());
        assert_eq!(monitor.in_flight(), 0);
    }

    #[test]
    fn operation_ids_are_unique() {
        assert_ne!(OperationId::new(), OperationId::new());
    }
}
