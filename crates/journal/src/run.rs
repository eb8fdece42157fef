//! Per-invocation replication state and its serializable report

use chrono::{DateTime, Utc};
use ferry_core::{Changeset, ChangesetId};
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

/// Replication state machine
///
/// `Idle → Scanning → (Applying → Committing → Scanning)* → Advancing → Idle`,
/// with `Aborted` reachable from any live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Scanning,
    Applying,
    Committing,
    Advancing,
    Aborted,
}

impl RunState {
    /// Whether `next` may follow this state
    pub fn can_enter(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Aborted, _) => false,
            (_, Aborted) => true,
            (Idle, Scanning)
            | (Scanning, Applying)
            | (Scanning, Advancing)
            | (Scanning, Idle)
            | (Applying, Committing)
            | (Committing, Scanning)
            | (Advancing, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Scanning => "scanning",
            RunState::Applying => "applying",
            RunState::Committing => "committing",
            RunState::Advancing => "advancing",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// One source changeset replicated into the destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicatedCommit {
    pub source: ChangesetId,
    pub seq: u64,
    pub summary: String,
    pub dest_commit: String,
    pub files_written: Vec<String>,
    pub files_deleted: Vec<String>,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Checkpoint already at or past the bound
    UpToDate,
    /// New history examined, none of it relevant; checkpoint untouched
    NoRelevantChanges,
    /// At least one changeset committed and the checkpoint advanced
    Replicated,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunOutcome::UpToDate => "up to date",
            RunOutcome::NoRelevantChanges => "no relevant changes",
            RunOutcome::Replicated => "replicated",
        };
        f.write_str(text)
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub branch: String,
    pub previous_checkpoint: ChangesetId,
    pub checkpoint: ChangesetId,
    pub bound: ChangesetId,
    pub examined: usize,
    pub merges_skipped: usize,
    pub unrelated_skipped: usize,
    /// Relevant changesets found already committed by an earlier, aborted run
    pub already_applied: usize,
    pub commits: Vec<ReplicatedCommit>,
    /// Destination commit that advanced the checkpoint
    pub checkpoint_commit: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Whether the checkpoint moved during this run
    pub fn advanced(&self) -> bool {
        self.checkpoint != self.previous_checkpoint
    }
}

/// Mutable state of one replication invocation
#[derive(Debug)]
pub struct ReplicationRun {
    state: RunState,
    branch: String,
    checkpoint: ChangesetId,
    checkpoint_seq: u64,
    bound: ChangesetId,
    bound_seq: u64,
    last_examined: Option<ChangesetId>,
    examined: usize,
    merges_skipped: usize,
    unrelated_skipped: usize,
    already_applied: usize,
    commits: Vec<ReplicatedCommit>,
    started_at: DateTime<Utc>,
}

impl ReplicationRun {
    pub fn new(
        branch: impl Into<String>,
        checkpoint: (ChangesetId, u64),
        bound: (ChangesetId, u64),
    ) -> Self {
        Self {
            state: RunState::Idle,
            branch: branch.into(),
            checkpoint: checkpoint.0,
            checkpoint_seq: checkpoint.1,
            bound: bound.0,
            bound_seq: bound.1,
            last_examined: None,
            examined: 0,
            merges_skipped: 0,
            unrelated_skipped: 0,
            already_applied: 0,
            commits: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`
    pub fn enter(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_enter(next),
            "invalid replication state transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!(from = %self.state, to = %next, "Replication state");
        self.state = next;
    }

    pub fn abort(&mut self) {
        if self.state != RunState::Aborted {
            self.enter(RunState::Aborted);
        }
    }

    pub fn checkpoint(&self) -> &ChangesetId {
        &self.checkpoint
    }

    pub fn bound(&self) -> &ChangesetId {
        &self.bound
    }

    /// Nothing lies between the checkpoint and the bound
    pub fn is_up_to_date(&self) -> bool {
        self.checkpoint_seq >= self.bound_seq
    }

    /// Sequence indices still to examine, in order
    pub fn pending(&self) -> RangeInclusive<u64> {
        self.checkpoint_seq + 1..=self.bound_seq
    }

    pub fn examine(&mut self, changeset: &Changeset) {
        self.last_examined = Some(changeset.id.clone());
        self.examined += 1;
    }

    pub fn last_examined(&self) -> Option<&ChangesetId> {
        self.last_examined.as_ref()
    }

    pub fn skip_merge(&mut self) {
        self.merges_skipped += 1;
    }

    pub fn skip_unrelated(&mut self) {
        self.unrelated_skipped += 1;
    }

    pub fn mark_already_applied(&mut self) {
        self.already_applied += 1;
    }

    pub fn record(&mut self, commit: ReplicatedCommit) {
        self.commits.push(commit);
    }

    pub fn commits(&self) -> &[ReplicatedCommit] {
        &self.commits
    }

    /// At least one relevant changeset is committed in the destination
    pub fn produced_commit(&self) -> bool {
        !self.commits.is_empty() || self.already_applied > 0
    }

    /// Close the run; `checkpoint_commit` is the commit that advanced the
    /// checkpoint to the last examined changeset, if any
    pub fn finish(mut self, checkpoint_commit: Option<String>) -> RunReport {
        let outcome = if self.is_up_to_date() {
            RunOutcome::UpToDate
        } else if checkpoint_commit.is_some() {
            RunOutcome::Replicated
        } else {
            RunOutcome::NoRelevantChanges
        };

        let checkpoint = match (&checkpoint_commit, &self.last_examined) {
            (Some(_), Some(last)) => last.clone(),
            _ => self.checkpoint.clone(),
        };

        self.state = RunState::Idle;

        RunReport {
            outcome,
            branch: self.branch,
            previous_checkpoint: self.checkpoint,
            checkpoint,
            bound: self.bound,
            examined: self.examined,
            merges_skipped: self.merges_skipped,
            unrelated_skipped: self.unrelated_skipped,
            already_applied: self.already_applied,
            commits: self.commits,
            checkpoint_commit,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}
