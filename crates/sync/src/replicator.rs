//! Changeset replication
//!
//! Walks source history forward from the checkpoint, replays every relevant
//! single-parent changeset as one destination commit, then advances the
//! checkpoint to the last changeset examined.

use ferry_core::{
    git_identity, Changeset, ChangesetId, CommitRequest, ContentTransformer, DestinationWriter,
    FileAction, HistoryWalker, PathMapper, ReplicationConfig, ReplicationError, Result,
    TrackedFile,
};
use ferry_journal::{CheckpointStore, ReplicatedCommit, ReplicationRun, RunReport, RunState, Trailer};
use std::collections::HashSet;

/// Replication settings that do not belong to a collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicatorOptions {
    /// Upper history bound (branch, tag or node)
    pub bound: String,
    pub checkpoint_file: String,
    pub trailer: String,
    pub checkpoint_message: String,
}

impl ReplicatorOptions {
    pub fn from_config(config: &ReplicationConfig) -> Self {
        Self {
            bound: config.source.branch.clone(),
            checkpoint_file: config.destination.checkpoint_file.clone(),
            trailer: config.destination.trailer.clone(),
            checkpoint_message: config.destination.checkpoint_message.clone(),
        }
    }
}

impl Default for ReplicatorOptions {
    fn default() -> Self {
        Self::from_config(&ReplicationConfig::default())
    }
}

/// Progress callbacks
pub trait ReplicationObserver {
    /// Called once with the number of changesets about to be examined
    fn on_start(&mut self, _pending: u64) {}

    fn on_examined(&mut self, _changeset: &Changeset) {}

    fn on_replicated(&mut self, _commit: &ReplicatedCommit) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ReplicationObserver for NoopObserver {}

/// A relevant changeset waiting to be replicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChangeset {
    pub id: ChangesetId,
    pub seq: u64,
    pub summary: String,
    pub author: String,
    /// Destination paths the changeset touches
    pub files: Vec<String>,
    /// Already committed by an earlier aborted run
    pub already_applied: bool,
}

/// What a run would do, computed without writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub checkpoint: ChangesetId,
    pub checkpoint_seq: u64,
    pub bound: ChangesetId,
    pub bound_seq: u64,
    pub pending: Vec<PendingChangeset>,
    pub merges_skipped: usize,
    pub unrelated_skipped: usize,
    pub last_examined: Option<ChangesetId>,
}

impl Plan {
    pub fn is_up_to_date(&self) -> bool {
        self.checkpoint_seq >= self.bound_seq
    }

    /// Changesets a run would commit
    pub fn to_replicate(&self) -> impl Iterator<Item = &PendingChangeset> {
        self.pending.iter().filter(|p| !p.already_applied)
    }
}

/// Replicates source history into the destination
pub struct Replicator<H, D> {
    history: H,
    dest: D,
    mapper: PathMapper,
    transformer: ContentTransformer,
    checkpoint: CheckpointStore,
    trailer: Trailer,
    options: ReplicatorOptions,
}

impl<H: HistoryWalker, D: DestinationWriter> Replicator<H, D> {
    pub fn new(
        history: H,
        dest: D,
        mapper: PathMapper,
        transformer: ContentTransformer,
        options: ReplicatorOptions,
    ) -> Self {
        Self {
            checkpoint: CheckpointStore::new(options.checkpoint_file.clone()),
            trailer: Trailer::new(options.trailer.clone()),
            history,
            dest,
            mapper,
            transformer,
            options,
        }
    }

    pub fn from_config(history: H, dest: D, config: &ReplicationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            history,
            dest,
            config.mapper()?,
            config.transformer(),
            ReplicatorOptions::from_config(config),
        ))
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut H {
        &mut self.history
    }

    pub fn destination(&self) -> &D {
        &self.dest
    }

    pub fn destination_mut(&mut self) -> &mut D {
        &mut self.dest
    }

    pub fn options(&self) -> &ReplicatorOptions {
        &self.options
    }

    pub fn into_parts(self) -> (H, D) {
        (self.history, self.dest)
    }

    /// Check the destination is ready, returning its branch
    pub fn preflight(&self) -> Result<String> {
        let branch = self.dest.current_branch()?;
        if !self.dest.is_clean()? {
            return Err(ReplicationError::Configuration(
                "destination working tree has uncommitted changes".to_string(),
            ));
        }
        Ok(branch)
    }

    /// Compute pending work without touching the destination
    pub fn plan(&self) -> Result<Plan> {
        let (checkpoint, checkpoint_seq) = self.resolve_checkpoint()?;
        let (bound, bound_seq) = self.history.resolve(&self.options.bound)?;
        let applied = self.already_applied()?;

        let mut plan = Plan {
            checkpoint,
            checkpoint_seq,
            bound,
            bound_seq,
            pending: Vec::new(),
            merges_skipped: 0,
            unrelated_skipped: 0,
            last_examined: None,
        };
        if plan.is_up_to_date() {
            return Ok(plan);
        }

        for seq in checkpoint_seq + 1..=bound_seq {
            let changeset = self.history.changeset_at(seq)?;
            plan.last_examined = Some(changeset.id.clone());

            if changeset.is_merge() {
                plan.merges_skipped += 1;
                continue;
            }
            let tracked = self.tracked_files(&changeset);
            if tracked.is_empty() {
                plan.unrelated_skipped += 1;
                continue;
            }

            plan.pending.push(PendingChangeset {
                already_applied: applied.contains(&changeset.id),
                id: changeset.id,
                seq,
                summary: changeset.description.lines().next().unwrap_or("").to_string(),
                author: changeset.author,
                files: tracked.into_iter().map(|file| file.dest).collect(),
            });
        }

        Ok(plan)
    }

    /// Replicate everything between the checkpoint and the bound
    ///
    /// On error the checkpoint is left where it was and uncommitted
    /// destination changes are discarded.
    pub fn run(&mut self, observer: &mut dyn ReplicationObserver) -> Result<RunReport> {
        let branch = self.preflight()?;
        let checkpoint = self.resolve_checkpoint()?;
        let bound = self.history.resolve(&self.options.bound)?;

        let mut run = ReplicationRun::new(branch, checkpoint, bound);
        if run.is_up_to_date() {
            tracing::info!(
                checkpoint = %run.checkpoint().short(),
                bound = %run.bound().short(),
                "Destination already up to date"
            );
            return Ok(run.finish(None));
        }

        let pending = run.pending();
        tracing::info!(
            from = pending.start(),
            to = pending.end(),
            bound = %self.options.bound,
            "Replicating source history"
        );
        observer.on_start(pending.end() - pending.start() + 1);

        match self.replicate(&mut run, observer) {
            Ok(checkpoint_commit) => Ok(run.finish(checkpoint_commit)),
            Err(err) => {
                tracing::error!(
                    state = %run.state(),
                    error = %err,
                    "Replication aborted, checkpoint not advanced"
                );
                run.abort();
                if let Err(discard_err) = self.dest.discard_uncommitted() {
                    tracing::warn!(error = %discard_err, "Failed to discard uncommitted changes");
                }
                Err(err)
            }
        }
    }

    fn replicate(
        &mut self,
        run: &mut ReplicationRun,
        observer: &mut dyn ReplicationObserver,
    ) -> Result<Option<String>> {
        let applied = self.already_applied()?;
        if !applied.is_empty() {
            tracing::info!(
                count = applied.len(),
                "Found changesets committed after the last checkpoint"
            );
        }

        run.enter(RunState::Scanning);
        for seq in run.pending() {
            let changeset = self.history.changeset_at(seq)?;
            run.examine(&changeset);
            observer.on_examined(&changeset);

            if changeset.is_merge() {
                tracing::debug!(seq, changeset = %changeset.id.short(), "Skipping merge");
                run.skip_merge();
                continue;
            }

            let tracked = self.tracked_files(&changeset);
            if tracked.is_empty() {
                tracing::debug!(seq, changeset = %changeset.id.short(), "Skipping unrelated changeset");
                run.skip_unrelated();
                continue;
            }

            if applied.contains(&changeset.id) {
                tracing::info!(
                    seq,
                    changeset = %changeset.id.short(),
                    "Changeset already replicated, not applying again"
                );
                run.mark_already_applied();
                continue;
            }

            let commit = self.replicate_one(run, &changeset, &tracked)?;
            observer.on_replicated(&commit);
            run.record(commit);
            run.enter(RunState::Scanning);
        }

        if !run.produced_commit() {
            tracing::info!("No relevant changesets, checkpoint unchanged");
            run.enter(RunState::Idle);
            return Ok(None);
        }

        let Some(last) = run.last_examined().cloned() else {
            run.enter(RunState::Idle);
            return Ok(None);
        };

        run.enter(RunState::Advancing);
        self.checkpoint.write(&mut self.dest, &last)?;
        let commit_id = self
            .dest
            .commit(&CommitRequest::bookkeeping(&self.options.checkpoint_message))?;
        tracing::info!(
            checkpoint = %last.short(),
            commit = %commit_id,
            "Checkpoint advanced"
        );
        run.enter(RunState::Idle);

        Ok(Some(commit_id))
    }

    /// Stage and commit one relevant changeset
    fn replicate_one(
        &mut self,
        run: &mut ReplicationRun,
        changeset: &Changeset,
        tracked: &[TrackedFile],
    ) -> Result<ReplicatedCommit> {
        let author = git_identity(&changeset.author)?;
        let timestamp = changeset.timestamp.to_fixed()?;

        run.enter(RunState::Applying);
        let mut files_written = Vec::new();
        let mut files_deleted = Vec::new();

        for file in tracked {
            let content = self.history.content_of(changeset, &file.source)?;
            match FileAction::from(content) {
                FileAction::Write(bytes) => {
                    let existing = if self.transformer.needs_existing(&file.dest) {
                        self.dest.read_file(&file.dest)?
                    } else {
                        None
                    };
                    let bytes = self.transformer.transform(&file.dest, bytes, existing.as_deref())?;
                    self.dest.stage_write(&file.dest, &bytes)?;
                    files_written.push(file.dest.clone());
                }
                FileAction::Delete => {
                    self.dest.stage_delete(&file.dest)?;
                    files_deleted.push(file.dest.clone());
                }
            }
        }

        run.enter(RunState::Committing);
        let message = self.trailer.message(&changeset.description, &changeset.id);
        let dest_commit = self.dest.commit(&CommitRequest {
            message: &message,
            author: Some(&author),
            timestamp: Some(timestamp),
        })?;

        tracing::info!(
            seq = changeset.seq,
            changeset = %changeset.id.short(),
            commit = %dest_commit,
            written = files_written.len(),
            deleted = files_deleted.len(),
            "{}",
            changeset.summary()
        );

        Ok(ReplicatedCommit {
            source: changeset.id.clone(),
            seq: changeset.seq,
            summary: changeset.summary().to_string(),
            dest_commit,
            files_written,
            files_deleted,
        })
    }

    fn tracked_files(&self, changeset: &Changeset) -> Vec<TrackedFile> {
        self.history
            .files_of(changeset)
            .iter()
            .filter_map(|path| self.mapper.track(path))
            .collect()
    }

    fn resolve_checkpoint(&self) -> Result<(ChangesetId, u64)> {
        let id = self.checkpoint.read(&self.dest)?;
        match self.history.resolve(id.as_str()) {
            Ok(resolved) => Ok(resolved),
            Err(ReplicationError::UnknownRevision(_)) => Err(ReplicationError::Configuration(
                format!("checkpoint {} does not exist in the source history", id),
            )),
            Err(e) => Err(e),
        }
    }

    /// Source ids committed since the checkpoint record last changed
    fn already_applied(&self) -> Result<HashSet<ChangesetId>> {
        let messages = self.dest.commit_messages_since(self.checkpoint.path())?;
        Ok(self.trailer.collect(&messages))
    }
}
