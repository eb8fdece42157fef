//! History replication between version-control systems
//!
//! This crate provides:
//! - The changeset replicator (checkpoint → bound, one commit per changeset)
//! - Mercurial source adapter (`hg` CLI)
//! - Git destination adapter (`git` CLI)

pub mod command;
pub mod git;
pub mod hg;
pub mod replicator;

// Re-exports
pub use git::GitDestination;
pub use hg::MercurialHistory;
pub use replicator::{
    NoopObserver, PendingChangeset, Plan, ReplicationObserver, Replicator, ReplicatorOptions,
};
