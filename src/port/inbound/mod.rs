//! Inbound ports (driving side): what callers of the core use.

pub mod query;
