//! Infrastructure configuration modules.

pub mod breaker;
pub mod cache;
pub mod federation;
pub mod logging;
pub mod pool;
pub mod settings;
