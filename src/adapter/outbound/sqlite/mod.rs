//! SQLite engine adapter.
//!
//! Implements the [`Engine`](crate::port::outbound::engine::Engine) port on
//! top of `rusqlite` with a bundled SQLite.

pub mod engine;

pub use engine::SqliteEngine;
