//! Source history access

use crate::changeset::{Changeset, ChangesetId};
use crate::error::Result;

/// Ordered, randomly addressable access to source changesets
///
/// Implemented by an adapter per history backend, so the replicator never
/// sees backend-specific types. All calls block.
pub trait HistoryWalker {
    /// Resolve a revision reference (node, short node, branch, tag) to its
    /// identifier and sequence index
    ///
    /// Unknown references yield `ReplicationError::UnknownRevision`.
    fn resolve(&self, reference: &str) -> Result<(ChangesetId, u64)>;

    /// The changeset at a sequence index
    fn changeset_at(&self, seq: u64) -> Result<Changeset>;

    /// Paths touched by a changeset
    fn files_of<'c>(&self, changeset: &'c Changeset) -> &'c [String] {
        &changeset.files
    }

    /// File content as of `changeset`, `None` if the file does not exist there
    fn content_of(&self, changeset: &Changeset, path: &str) -> Result<Option<Vec<u8>>>;

    /// Highest sequence index currently known
    fn latest_seq(&self) -> Result<u64>;

    /// Bring in new history from a remote
    fn pull(&mut self, remote_url: &str, branch: &str) -> Result<()>;
}
