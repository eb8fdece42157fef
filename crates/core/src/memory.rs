//! In-memory history and destination backends
//!
//! Deterministic implementations of [`HistoryWalker`] and
//! [`DestinationWriter`] for exercising replication without a VCS.

use crate::changeset::{Changeset, ChangesetId, Timestamp};
use crate::destination::{CommitRequest, DestinationWriter};
use crate::error::{ReplicationError, Result};
use crate::history::HistoryWalker;
use std::collections::BTreeMap;

/// Synthetic node hash for a sequence index
pub fn node_for(seq: u64) -> ChangesetId {
    // Spread the bits so ids do not share long common prefixes
    let mixed = (seq as u128 + 1).wrapping_mul(0x9e37_79b9_7f4a_7c15_f39c_c060_5ced_c835);
    ChangesetId::from_trusted(format!("{:08x}{:032x}", seq, mixed))
}

/// Linear (plus merges) history held in memory
///
/// Sequence index equals position; every changeset records the content of
/// the files it touches, `None` meaning the file was removed.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    changesets: Vec<Changeset>,
    contents: Vec<BTreeMap<String, Option<Vec<u8>>>>,
    pulls: Vec<(String, String)>,
    pending: Vec<(Changeset, BTreeMap<String, Option<Vec<u8>>>)>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single-parent changeset
    pub fn record(&mut self, description: &str, files: &[(&str, Option<&str>)]) -> ChangesetId {
        let parents = self.changesets.last().map(|cs| vec![cs.id.clone()]).unwrap_or_default();
        self.append(description, parents, files)
    }

    /// Append a merge of the previous changeset and the one at `other_seq`
    pub fn record_merge(
        &mut self,
        description: &str,
        other_seq: u64,
        files: &[(&str, Option<&str>)],
    ) -> ChangesetId {
        let mut parents: Vec<ChangesetId> =
            self.changesets.last().map(|cs| vec![cs.id.clone()]).unwrap_or_default();
        parents.push(node_for(other_seq));
        self.append(description, parents, files)
    }

    /// Queue a changeset that only becomes visible after [`HistoryWalker::pull`]
    pub fn record_remote(&mut self, description: &str, files: &[(&str, Option<&str>)]) {
        let seq = (self.changesets.len() + self.pending.len()) as u64;
        let parent = if seq == 0 { vec![] } else { vec![node_for(seq - 1)] };
        let (cs, contents) = build(seq, description, parent, files);
        self.pending.push((cs, contents));
    }

    pub fn len(&self) -> usize {
        self.changesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }

    pub fn pulls(&self) -> &[(String, String)] {
        &self.pulls
    }

    fn append(
        &mut self,
        description: &str,
        parents: Vec<ChangesetId>,
        files: &[(&str, Option<&str>)],
    ) -> ChangesetId {
        let seq = self.changesets.len() as u64;
        let (cs, contents) = build(seq, description, parents, files);
        let id = cs.id.clone();
        self.changesets.push(cs);
        self.contents.push(contents);
        id
    }
}

fn build(
    seq: u64,
    description: &str,
    parents: Vec<ChangesetId>,
    files: &[(&str, Option<&str>)],
) -> (Changeset, BTreeMap<String, Option<Vec<u8>>>) {
    let contents: BTreeMap<String, Option<Vec<u8>>> = files
        .iter()
        .map(|(path, content)| (path.to_string(), content.map(|c| c.as_bytes().to_vec())))
        .collect();

    let cs = Changeset {
        id: node_for(seq),
        seq,
        parents,
        author: "Test Author <author@example.com>".to_string(),
        // One hour apart, recorded in UTC+01:00
        timestamp: Timestamp::new(1_400_000_000 + seq as i64 * 3600, -3600),
        description: description.to_string(),
        files: files.iter().map(|(path, _)| path.to_string()).collect(),
    };

    (cs, contents)
}

impl HistoryWalker for MemoryHistory {
    fn resolve(&self, reference: &str) -> Result<(ChangesetId, u64)> {
        let last = || {
            self.changesets
                .last()
                .map(|cs| (cs.id.clone(), cs.seq))
                .ok_or_else(|| ReplicationError::UnknownRevision(reference.to_string()))
        };

        match reference {
            "tip" | "default" => last(),
            _ => {
                if let Some(cs) = self.changesets.iter().find(|cs| cs.id.as_str() == reference) {
                    return Ok((cs.id.clone(), cs.seq));
                }
                match reference.parse::<u64>() {
                    Ok(seq) if (seq as usize) < self.changesets.len() => {
                        Ok((self.changesets[seq as usize].id.clone(), seq))
                    }
                    _ => Err(ReplicationError::UnknownRevision(reference.to_string())),
                }
            }
        }
    }

    fn changeset_at(&self, seq: u64) -> Result<Changeset> {
        self.changesets
            .get(seq as usize)
            .cloned()
            .ok_or_else(|| ReplicationError::SourceRead(format!("no changeset at {}", seq)))
    }

    fn content_of(&self, changeset: &Changeset, path: &str) -> Result<Option<Vec<u8>>> {
        let upto = (changeset.seq as usize).min(self.contents.len().saturating_sub(1));
        for contents in self.contents[..=upto].iter().rev() {
            if let Some(content) = contents.get(path) {
                return Ok(content.clone());
            }
        }
        Ok(None)
    }

    fn latest_seq(&self) -> Result<u64> {
        self.changesets
            .last()
            .map(|cs| cs.seq)
            .ok_or_else(|| ReplicationError::SourceRead("history is empty".to_string()))
    }

    fn pull(&mut self, remote_url: &str, branch: &str) -> Result<()> {
        self.pulls.push((remote_url.to_string(), branch.to_string()));
        for (cs, contents) in self.pending.drain(..) {
            self.changesets.push(cs);
            self.contents.push(contents);
        }
        Ok(())
    }
}

/// A commit recorded by [`MemoryDestination`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommit {
    pub id: String,
    pub message: String,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    /// Path → new content, `None` for removals
    pub changes: BTreeMap<String, Option<Vec<u8>>>,
}

/// Destination working tree and commit log held in memory
#[derive(Debug)]
pub struct MemoryDestination {
    head: BTreeMap<String, Vec<u8>>,
    worktree: BTreeMap<String, Vec<u8>>,
    staged: BTreeMap<String, Option<Vec<u8>>>,
    commits: Vec<MemoryCommit>,
    branch: Option<String>,
    fail_commit_at: Option<usize>,
    fail_stage_at: Option<String>,
    pulls: Vec<(String, String)>,
    pushes: Vec<(String, String)>,
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self {
            head: BTreeMap::new(),
            worktree: BTreeMap::new(),
            staged: BTreeMap::new(),
            commits: Vec::new(),
            branch: Some("master".to_string()),
            fail_commit_at: None,
            fail_stage_at: None,
            pulls: Vec::new(),
            pushes: Vec::new(),
        }
    }
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit initial files directly, as if the tree was set up by hand
    pub fn seed(&mut self, files: &[(&str, &str)], message: &str) -> Result<String> {
        for (path, content) in files {
            self.stage_write(path, content.as_bytes())?;
        }
        self.commit(&CommitRequest::bookkeeping(message))
    }

    /// Make the commit with this zero-based index (counting all commits) fail
    pub fn fail_commit_at(&mut self, index: usize) {
        self.fail_commit_at = Some(index);
    }

    /// Make staging of this path fail
    pub fn fail_stage_of(&mut self, path: &str) {
        self.fail_stage_at = Some(path.to_string());
    }

    /// Modify a file without staging it
    pub fn touch_unstaged(&mut self, path: &str, content: &str) {
        self.worktree.insert(path.to_string(), content.as_bytes().to_vec());
    }

    /// Detach HEAD
    pub fn detach(&mut self) {
        self.branch = None;
    }

    pub fn commits(&self) -> &[MemoryCommit] {
        &self.commits
    }

    /// Committed content of a file
    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.head.get(path).map(|v| v.as_slice())
    }

    pub fn file_str(&self, path: &str) -> Option<&str> {
        self.file(path).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn pulls(&self) -> &[(String, String)] {
        &self.pulls
    }

    pub fn pushes(&self) -> &[(String, String)] {
        &self.pushes
    }
}

impl DestinationWriter for MemoryDestination {
    fn is_clean(&self) -> Result<bool> {
        Ok(self.staged.is_empty() && self.worktree == self.head)
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.worktree.get(path).cloned())
    }

    fn stage_write(&mut self, path: &str, content: &[u8]) -> Result<()> {
        if self.fail_stage_at.as_deref() == Some(path) {
            return Err(ReplicationError::DestinationWrite(format!("cannot stage {}", path)));
        }
        self.worktree.insert(path.to_string(), content.to_vec());
        self.staged.insert(path.to_string(), Some(content.to_vec()));
        Ok(())
    }

    fn stage_delete(&mut self, path: &str) -> Result<()> {
        if self.fail_stage_at.as_deref() == Some(path) {
            return Err(ReplicationError::DestinationWrite(format!("cannot remove {}", path)));
        }
        self.worktree.remove(path);
        self.staged.insert(path.to_string(), None);
        Ok(())
    }

    fn commit(&mut self, request: &CommitRequest<'_>) -> Result<String> {
        if self.fail_commit_at == Some(self.commits.len()) {
            self.fail_commit_at = None;
            return Err(ReplicationError::DestinationWrite("commit rejected".to_string()));
        }

        let changes = std::mem::take(&mut self.staged);
        for (path, content) in &changes {
            match content {
                Some(bytes) => {
                    self.head.insert(path.clone(), bytes.clone());
                }
                None => {
                    self.head.remove(path);
                }
            }
        }

        let id = format!("{:040x}", self.commits.len() + 1);
        self.commits.push(MemoryCommit {
            id: id.clone(),
            message: request.message.to_string(),
            author: request.author.map(str::to_string),
            timestamp: request.timestamp.map(|ts| ts.to_rfc3339()),
            changes,
        });
        Ok(id)
    }

    fn discard_uncommitted(&mut self) -> Result<()> {
        self.staged.clear();
        self.worktree = self.head.clone();
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        self.branch
            .clone()
            .ok_or_else(|| ReplicationError::Configuration("HEAD is detached".to_string()))
    }

    fn commit_messages_since(&self, path: &str) -> Result<Vec<String>> {
        let start = self
            .commits
            .iter()
            .rposition(|commit| commit.changes.contains_key(path))
            .map(|i| i + 1)
            .unwrap_or(0);

        Ok(self.commits[start..]
            .iter()
            .rev()
            .map(|commit| commit.message.clone())
            .collect())
    }

    fn pull(&mut self, remote: &str, branch: &str) -> Result<()> {
        self.pulls.push((remote.to_string(), branch.to_string()));
        Ok(())
    }

    fn push(&mut self, remote: &str, branch: &str) -> Result<()> {
        self.pushes.push((remote.to_string(), branch.to_string()));
        Ok(())
    }
}
