//! Dataset adapters.
//!
//! - [`EngineDataset`]: runs the pattern's query text on a pooled engine.
//! - [`SnapshotDataset`]: serves records from a JSON snapshot file.

pub mod engine;
pub mod snapshot;

pub use engine::EngineDataset;
pub use snapshot::SnapshotDataset;
