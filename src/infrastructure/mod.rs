//! Infrastructure layer.
//!
//! Technical concerns that support the application without containing
//! query logic.
//!
//! # Submodules
//!
//! - [`bootstrap`] - Composition root for runtime wiring
//! - [`breaker`] - Per-dependency circuit breakers
//! - [`config`] - Configuration loading and validation
//! - [`pool`] - Bounded engine connection pool

pub mod bootstrap;
pub mod breaker;
pub mod config;
pub mod pool;
