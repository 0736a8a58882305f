//! Query result caching.
//!
//! [`ResultCache`] stores serialized results keyed by the SHA-256 of the
//! canonical query pattern:
//!
//! - `codec`: JSON payloads, gzip-compressed above a size threshold
//! - `coalesce`: per-key in-flight fetch deduplication
//! - [`stats`]: hit/miss accounting, rolling hit rate, per-pattern latency

mod codec;
mod coalesce;
pub mod result;
pub mod stats;

pub use result::{Cached, ResultCache};
pub use stats::{CacheReport, PatternLatency};
