//! Replication progress bookkeeping
//!
//! This crate provides:
//! - The checkpoint record kept in the destination tree
//! - Source-id trailers on replicated commit messages
//! - Run state machine and the JSON run report

pub mod checkpoint;
pub mod run;
pub mod trailer;

// Re-exports
pub use checkpoint::CheckpointStore;
pub use run::{ReplicatedCommit, ReplicationRun, RunOutcome, RunReport, RunState};
pub use trailer::Trailer;
