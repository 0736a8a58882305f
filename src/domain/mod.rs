//! Domain types shared by every layer: query patterns, records and results.

pub mod pattern;
pub mod record;
pub mod result;

pub use pattern::{CacheKey, CanonicalPattern, Entities, QueryPattern};
pub use record::{geography_key, is_geography_field, matches_geography, snake_case, Record};
pub use result::{FederatedResult, FederationMetadata, QueryResponse, ResponseMetadata};
