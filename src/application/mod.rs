//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the query path.

pub mod cache;
pub mod federation;
pub mod query;
