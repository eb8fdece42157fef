//! Persisted replication checkpoint

use ferry_core::{ChangesetId, DestinationWriter, ReplicationError, Result};

/// The checkpoint record: one file at the destination root holding the id of
/// the last fully replicated source changeset
///
/// The record lives inside the destination tree and is committed alongside
/// the replicated history, so it can never run ahead of the commits it
/// describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    path: String,
}

impl CheckpointStore {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Destination-relative path of the record
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read the current checkpoint
    ///
    /// A missing or unparsable record is an operator error: replication
    /// refuses to guess where to start.
    pub fn read<D: DestinationWriter + ?Sized>(&self, dest: &D) -> Result<ChangesetId> {
        let bytes = dest.read_file(&self.path)?.ok_or_else(|| {
            ReplicationError::Configuration(format!(
                "checkpoint file '{}' not found; write the id of the last replicated source changeset into it",
                self.path
            ))
        })?;

        let text = String::from_utf8(bytes).map_err(|_| {
            ReplicationError::Configuration(format!("checkpoint file '{}' is not UTF-8", self.path))
        })?;

        ChangesetId::parse(&text).map_err(|e| {
            ReplicationError::Configuration(format!("checkpoint file '{}': {}", self.path, e))
        })
    }

    /// Stage a new checkpoint for the next destination commit
    pub fn write<D: DestinationWriter + ?Sized>(&self, dest: &mut D, id: &ChangesetId) -> Result<()> {
        tracing::debug!(path = %self.path, checkpoint = %id, "Staging checkpoint");
        dest.stage_write(&self.path, format!("{}\n", id).as_bytes())
    }
}
