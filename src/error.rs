use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Connection pool errors.
#[derive(Error, Debug)]
pub enum PoolError {
    /// No connection became available within the acquire timeout.
    #[error("timed out after {waited:?} waiting for an engine connection")]
    AcquireTimeout { waited: Duration },

    /// The pool is shutting down; retrying against this pool will not succeed.
    #[error("connection pool is closing")]
    Closing,

    /// The engine rejected a query. Surfaced verbatim, never retried.
    #[error("query failed: {0}")]
    Query(String),

    /// The engine could not open a new session.
    #[error("failed to open engine session: {0}")]
    Connect(String),
}

/// One failed source within a federated execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub error: String,
}

/// Errors raised by the federation layer.
#[derive(Error, Debug)]
pub enum FederationError {
    /// Every adapter attempted by a strategy failed.
    #[error("all sources failed: {}", format_attempts(.attempts))]
    AllSourcesFailed { attempts: Vec<SourceFailure> },

    /// Neither the requested, a capable, nor the default strategy is available.
    #[error("no federation strategy available (default '{default}' is not registered)")]
    NoStrategy { default: String },

    #[error("no dataset adapters registered")]
    NoAdapters,
}

impl FederationError {
    /// Source identifiers attempted, in attempt order.
    #[must_use]
    pub fn attempted_sources(&self) -> Vec<&str> {
        match self {
            Self::AllSourcesFailed { attempts } => {
                attempts.iter().map(|a| a.source.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn format_attempts(attempts: &[SourceFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{} ({})", a.source, a.error))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Federation(#[from] FederationError),

    /// The dependency is isolated by its circuit breaker.
    #[error("circuit open for '{dependency}', retry in {retry_after:?}")]
    CircuitOpen {
        dependency: String,
        retry_after: Duration,
    },

    /// A dataset adapter failed for a reason of its own.
    #[error("source '{source_id}' failed: {reason}")]
    Source { source_id: String, reason: String },

    /// The query translator could not produce a pattern.
    #[error("translation failed: {0}")]
    Translation(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl Error {
    /// True for failures a caller may retry after backing off.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Pool(PoolError::AcquireTimeout { .. }) | Self::CircuitOpen { .. }
        )
    }

    /// True for the error kinds surfaced to end users.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::Pool(PoolError::AcquireTimeout { .. })
                | Self::Federation(FederationError::AllSourcesFailed { .. })
                | Self::CircuitOpen { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}
