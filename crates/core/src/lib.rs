//! Core types for incremental history replication
//!
//! This crate provides:
//! - Changeset model (ids, timestamps, tracked files)
//! - Collaborator traits for source history and destination tree
//! - Path filter / mapper sharing one prefix table
//! - Content transform rules, including locale tag preservation
//! - Error taxonomy and TOML configuration
//! - In-memory backends

pub mod changeset;
pub mod config;
pub mod destination;
pub mod error;
pub mod history;
pub mod locale;
pub mod memory;
pub mod paths;
pub mod transform;

// Re-exports
pub use changeset::{git_identity, Changeset, ChangesetId, FileAction, Timestamp, TrackedFile};
pub use config::ReplicationConfig;
pub use destination::{CommitRequest, DestinationWriter};
pub use error::{ErrorKind, ReplicationError, Result};
pub use history::HistoryWalker;
pub use paths::{PathMapper, PrefixRule};
pub use transform::{ContentTransformer, TransformRule};
