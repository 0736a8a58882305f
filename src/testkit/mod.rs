//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`engine`] - In-memory [`Engine`](crate::port::outbound::engine::Engine)
//!   with counters, injected delays and failures.
//! - [`dataset`] - Scripted [`DatasetAdapter`](crate::port::outbound::dataset::DatasetAdapter).
//! - [`monitor`] - Monitor that records every operation for assertions.
//! - [`domain`] - Builders for patterns and records.
//! - [`config`] - Canonical test configurations.

pub mod config;
pub mod dataset;
pub mod domain;
pub mod engine;
pub mod monitor;
