//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies: the embedded
//! engine, dataset sources and the monitoring sink.

pub mod dataset;
pub mod engine;
pub mod monitor;
