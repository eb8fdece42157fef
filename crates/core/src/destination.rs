//! Destination tree access

use crate::error::Result;
use chrono::{DateTime, FixedOffset};

/// Metadata for one destination commit
///
/// `author` and `timestamp` are `None` for bookkeeping commits (the
/// checkpoint update), which use the destination's own identity and clock.
#[derive(Debug, Clone)]
pub struct CommitRequest<'a> {
    pub message: &'a str,
    /// Git identity, `Name <email>`
    pub author: Option<&'a str>,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl<'a> CommitRequest<'a> {
    pub fn bookkeeping(message: &'a str) -> Self {
        Self {
            message,
            author: None,
            timestamp: None,
        }
    }
}

/// Staged writes and atomic commits over the destination working tree
///
/// Paths are relative to the destination root with `/` separators.
pub trait DestinationWriter {
    /// No uncommitted modifications to tracked files
    fn is_clean(&self) -> Result<bool>;

    /// Current working-tree content of a file, `None` if absent
    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write a file (creating parent directories) and stage it
    fn stage_write(&mut self, path: &str, content: &[u8]) -> Result<()>;

    /// Remove a file and stage the removal
    fn stage_delete(&mut self, path: &str) -> Result<()>;

    /// Commit everything staged, returning the new commit id
    ///
    /// A commit is created even when nothing is staged.
    fn commit(&mut self, request: &CommitRequest<'_>) -> Result<String>;

    /// Throw away staged and unstaged modifications, back to the last commit
    fn discard_uncommitted(&mut self) -> Result<()>;

    fn current_branch(&self) -> Result<String>;

    /// Messages of commits made after the last commit that touched `path`,
    /// newest first; every commit if `path` was never committed
    fn commit_messages_since(&self, path: &str) -> Result<Vec<String>>;

    fn pull(&mut self, remote: &str, branch: &str) -> Result<()>;

    fn push(&mut self, remote: &str, branch: &str) -> Result<()>;
}
