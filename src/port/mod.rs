//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! # Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      Application        │
//!     ┌──────────────┤  cache · federation     ├──────────────┐
//!     │              └─────────────────────────┘              │
//!     ▼                         ▼                             ▼
//! ┌─────────┐            ┌─────────────┐              ┌───────────┐
//! │ Engine  │            │  Dataset    │              │  Monitor  │
//! │ (SQLite)│            │  Adapters   │              │   sink    │
//! └─────────┘            └─────────────┘              └───────────┘
//! ```
//!
//! - [`inbound::query`] - the query API and the translator it consumes
//! - [`outbound::engine`] - embedded engine sessions
//! - [`outbound::dataset`] - data sources combined by the federator
//! - [`outbound::monitor`] - operation start/complete reporting

pub mod inbound;
pub mod outbound;
