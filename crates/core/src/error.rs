//! Error types for replication

use thiserror::Error;

/// Errors raised while replicating source history into the destination
///
/// Every variant aborts the current run. None of them are retried
/// automatically; recovery is always "fix the cause and rerun", relying on
/// the checkpoint boundary.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// Operator state is wrong (missing checkpoint, dirty tree, bad config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// History or content lookup failed for a reason other than "file absent"
    #[error("Source read error: {0}")]
    SourceRead(String),

    /// A revision reference does not exist in the source history
    #[error("Unknown source revision: {0}")]
    UnknownRevision(String),

    /// A content rule could not run on the given file
    #[error("Transform precondition failed for {path}: {reason}")]
    TransformPrecondition { path: String, reason: String },

    /// Staging, committing, pulling or pushing the destination failed
    #[error("Destination write error: {0}")]
    DestinationWrite(String),

    /// Author or date of a changeset cannot be expressed in the destination
    #[error("Invalid commit metadata: {0}")]
    CommitMetadata(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for exit codes and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    SourceRead,
    TransformPrecondition,
    DestinationWrite,
    Other,
}

impl ReplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplicationError::Configuration(_) => ErrorKind::Configuration,
            ReplicationError::SourceRead(_) | ReplicationError::UnknownRevision(_) => {
                ErrorKind::SourceRead
            }
            ReplicationError::TransformPrecondition { .. } => ErrorKind::TransformPrecondition,
            ReplicationError::DestinationWrite(_) | ReplicationError::CommitMetadata(_) => {
                ErrorKind::DestinationWrite
            }
            ReplicationError::Io(_) => ErrorKind::Other,
        }
    }

    /// Process exit code for an aborted run
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::TransformPrecondition => 3,
            ErrorKind::SourceRead => 4,
            ErrorKind::DestinationWrite => 5,
            ErrorKind::Other => 1,
        }
    }

    pub fn transform(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ReplicationError::TransformPrecondition {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for replication operations
pub type Result<T> = std::result::Result<T, ReplicationError>;
