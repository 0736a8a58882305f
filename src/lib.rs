//! Queryweave - query execution and resource management core.
//!
//! The core sits between a natural-language front end and a set of
//! demographic data sources. It answers translated query patterns by:
//!
//! - pooling sessions to an embedded SQL engine ([`infrastructure::pool`]),
//! - caching results with TTL, stale-while-revalidate, compression and LRU
//!   eviction ([`application::cache`]),
//! - federating over several sources with pluggable strategies
//!   ([`application::federation`]),
//! - isolating failing dependencies behind circuit breakers
//!   ([`infrastructure::breaker`]).
//!
//! # Modules
//!
//! - [`domain`] - Query patterns, records and result metadata
//! - [`port`] - Traits at the boundaries: engine, dataset adapters, monitor
//! - [`application`] - Cache, federation and the query service
//! - [`adapter`] - SQLite engine, dataset adapters and the CLI
//! - [`infrastructure`] - Config, pool, breakers and the composition root
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use queryweave::domain::QueryPattern;
//! use queryweave::infrastructure::bootstrap;
//! use queryweave::infrastructure::config::settings::Config;
//! use queryweave::port::inbound::query::QueryService;
//! use queryweave::port::outbound::monitor::TracingMonitor;
//!
//! # async fn run() -> queryweave::error::Result<()> {
//! let config = Config::load("queryweave.toml")?;
//! let core = bootstrap::start(&config, Arc::new(TracingMonitor::new())).await?;
//!
//! let pattern = QueryPattern::new("population_lookup", "SELECT county, population FROM county_population")
//!     .with_geography(["Travis"]);
//! let response = core.executor.execute_query(&pattern).await?;
//! println!("{} rows from {:?}", response.row_count(), response.metadata.sources);
//!
//! core.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
