//! Circuit breaker for isolating failing dependencies.
//!
//! # States
//!
//! ```text
//! Closed ──(threshold failures within window)──▶ Open
//! Open ──(reset timeout elapsed)──▶ HalfOpen
//! HalfOpen ──(success)──▶ Closed
//! HalfOpen ──(failure)──▶ Open (cooldown re-armed)
//! ```
//!
//! HalfOpen admits a single trial call. Concurrent callers are rejected as
//! if the breaker were still open until that trial finishes or is dropped.
//!
//! The Open → HalfOpen transition is evaluated lazily against
//! `next_attempt` whenever the breaker is consulted, so there is no timer
//! that could later override a manual [`CircuitBreaker::reset`].
//!
//! Each dependency gets its own breaker; [`BreakerRegistry`] hands them out
//! by name.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::infrastructure::config::breaker::BreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without invoking the dependency.
    Open,
    /// Cooldown elapsed; one trial call decides between Closed and Open.
    HalfOpen,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Time since the most recent failure.
    pub since_last_failure: Option<Duration>,
    /// Time until an open breaker admits a trial call.
    pub retry_after: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    next_attempt: Option<Instant>,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure: None,
            next_attempt: None,
            trial_in_flight: false,
        }
    }

    /// Move Open → HalfOpen once the cooldown has passed.
    fn refresh(&mut self, now: Instant) {
        if self.state == CircuitState::Open {
            if let Some(at) = self.next_attempt {
                if now >= at {
                    self.state = CircuitState::HalfOpen;
                }
            }
        }
    }
}

/// Failure-isolation wrapper around one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    dependency: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(dependency: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            config,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    #[must_use]
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Current state, applying any due Open → HalfOpen transition.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now());
        inner.state
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.refresh(now);
        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            since_last_failure: inner.last_failure.map(|t| now.saturating_duration_since(t)),
            retry_after: match inner.state {
                CircuitState::Open => inner.next_attempt.map(|t| t.saturating_duration_since(now)),
                _ => None,
            },
        }
    }

    /// Run `operation` unless the breaker is open.
    ///
    /// The operation's own error is returned unchanged after being recorded;
    /// the breaker only adds short-circuiting.
    ///
    /// # Errors
    ///
    /// [`Error::CircuitOpen`] while open or while another caller holds the
    /// half-open trial, otherwise whatever `operation` returns.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _trial = self.admit()?;
        match operation().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    fn admit(&self) -> Result<Option<TrialGuard<'_>>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.refresh(now);
        match inner.state {
            CircuitState::Closed => Ok(None),
            CircuitState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(Some(TrialGuard { breaker: self }))
            }
            CircuitState::HalfOpen => Err(Error::CircuitOpen {
                dependency: self.dependency.clone(),
                retry_after: Duration::ZERO,
            }),
            CircuitState::Open => {
                let retry_after = inner
                    .next_attempt
                    .map(|t| t.saturating_duration_since(now))
                    .unwrap_or_default();
                Err(Error::CircuitOpen {
                    dependency: self.dependency.clone(),
                    retry_after,
                })
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                *inner = BreakerInner::closed();
                info!(dependency = %self.dependency, "Circuit breaker closed after successful trial");
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            // A call admitted before the breaker opened finished late.
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.failure_count += 1;
                inner.last_failure = Some(now);
                self.open(&mut inner, now);
            }
            CircuitState::Closed => {
                let window = self.config.monitoring_window();
                if inner
                    .last_failure
                    .is_some_and(|t| now.saturating_duration_since(t) > window)
                {
                    inner.failure_count = 0;
                }
                inner.failure_count += 1;
                inner.last_failure = Some(now);
                if inner.failure_count >= self.config.failure_threshold {
                    self.open(&mut inner, now);
                }
            }
            CircuitState::Open => {
                inner.last_failure = Some(now);
            }
        }
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        let cooldown = self.config.reset_timeout();
        inner.state = CircuitState::Open;
        inner.trial_in_flight = false;
        inner.next_attempt = Some(now + cooldown);
        warn!(
            dependency = %self.dependency,
            failures = inner.failure_count,
            cooldown_ms = cooldown.as_millis() as u64,
            "Circuit breaker opened"
        );
    }

    /// Force the breaker closed and forget failures.
    pub fn reset(&self) {
        *self.inner.lock() = BreakerInner::closed();
        info!(dependency = %self.dependency, "Circuit breaker manually reset");
    }

    /// Force the breaker open for one cooldown period.
    pub fn trip(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        self.open(&mut inner, now);
    }
}

/// Releases the half-open trial slot, including when the trial is cancelled.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        self.breaker.inner.lock().trial_in_flight = false;
    }
}

/// Per-dependency breakers sharing one configuration.
#[derive(Debug)]
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Breaker for `dependency`, created on first use.
    #[must_use]
    pub fn get(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(dependency.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(dependency, self.config.clone())))
            .clone()
    }

    /// Snapshots of every breaker, sorted by dependency.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut out: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        out.sort_by(|a, b| a.dependency.cmp(&b.dependency));
        out
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.reset();
        }
    }
}
