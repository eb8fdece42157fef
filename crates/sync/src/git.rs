//! Git destination via the `git` command-line tool

use crate::command::{capture, create_command, stderr_of};
use ferry_core::paths::normalize_relative;
use ferry_core::{CommitRequest, DestinationWriter, ReplicationError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// `DestinationWriter` over a Git working tree
///
/// Every call runs against the explicit root handed to [`GitDestination::open`],
/// never the process working directory.
#[derive(Debug, Clone)]
pub struct GitDestination {
    root: PathBuf,
}

impl GitDestination {
    /// Open the working tree containing `root`
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut cmd = create_command("git");
        cmd.arg("-C").arg(root).args(["rev-parse", "--show-toplevel"]);

        let output = capture(&mut cmd).map_err(|e| {
            ReplicationError::Configuration(format!("failed to run git: {}", e))
        })?;
        if !output.status.success() {
            return Err(ReplicationError::Configuration(format!(
                "{} is not inside a Git working tree: {}",
                root.display(),
                stderr_of(&output)
            )));
        }

        let toplevel = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self {
            root: PathBuf::from(toplevel),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn git(&self) -> Command {
        let mut cmd = create_command("git");
        // Mapped file names are paths, never globs
        cmd.arg("-C").arg(&self.root).arg("--literal-pathspecs");
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        capture(self.git().args(args))
            .map_err(|e| ReplicationError::DestinationWrite(format!("failed to run git: {}", e)))
    }

    /// Run a git subcommand that must succeed, returning its stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(ReplicationError::DestinationWrite(format!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr_of(&output)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn worktree_path(&self, path: &str) -> Result<PathBuf> {
        normalize_relative(path)
            .map(|relative| self.root.join(relative))
            .map_err(|e| ReplicationError::DestinationWrite(e.to_string()))
    }

    /// Most recent commit that touched `path`, if any
    pub fn last_commit_touching(&self, path: &str) -> Result<Option<String>> {
        let stdout = self.run(&["log", "-1", "--format=%H", "--", path])?;
        let hash = stdout.trim();
        Ok((!hash.is_empty()).then(|| hash.to_string()))
    }

    /// First message lines of commits reachable from HEAD but not from
    /// `since` (every commit when `since` is `None`), newest first
    ///
    /// `%s` would fold the trailer line into the subject, so the raw
    /// message is split instead.
    pub fn log_subjects(&self, since: Option<&str>) -> Result<Vec<String>> {
        let range = match since {
            Some(rev) => format!("{}..HEAD", rev),
            None => "HEAD".to_string(),
        };
        let stdout = self.run(&["log", "--format=%B%x00", &range])?;
        Ok(stdout
            .split('\0')
            .filter_map(|message| message.trim().lines().next())
            .map(|line| line.trim().to_string())
            .collect())
    }
}

impl DestinationWriter for GitDestination {
    fn is_clean(&self) -> Result<bool> {
        let stdout = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(stdout.trim().is_empty())
    }

    fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.worktree_path(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ReplicationError::DestinationWrite(format!(
                "cannot read {}: {}",
                full.display(),
                e
            ))),
        }
    }

    fn stage_write(&mut self, path: &str, content: &[u8]) -> Result<()> {
        let full = self.worktree_path(path)?;
        let write_err = |e: std::io::Error| {
            ReplicationError::DestinationWrite(format!("cannot write {}: {}", full.display(), e))
        };

        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&full, content).map_err(write_err)?;

        self.run(&["add", "--", path])?;
        Ok(())
    }

    fn stage_delete(&mut self, path: &str) -> Result<()> {
        let full = self.worktree_path(path)?;
        match std::fs::remove_file(&full) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path, "Removed file already absent from destination");
            }
            Err(e) => {
                return Err(ReplicationError::DestinationWrite(format!(
                    "cannot remove {}: {}",
                    full.display(),
                    e
                )))
            }
        }

        self.run(&["rm", "--quiet", "--cached", "--ignore-unmatch", "--", path])?;
        Ok(())
    }

    fn commit(&mut self, request: &CommitRequest<'_>) -> Result<String> {
        let mut args: Vec<String> = vec![
            "commit".into(),
            "--quiet".into(),
            "--allow-empty".into(),
            "--no-verify".into(),
            "-m".into(),
            request.message.to_string(),
        ];
        if let Some(author) = request.author {
            args.push(format!("--author={}", author));
        }
        if let Some(timestamp) = request.timestamp {
            args.push(format!("--date={}", timestamp.to_rfc3339()));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&arg_refs)?;

        let head = self.run(&["rev-parse", "HEAD"])?;
        Ok(head.trim().to_string())
    }

    fn discard_uncommitted(&mut self) -> Result<()> {
        tracing::warn!(root = %self.root.display(), "Discarding uncommitted destination changes");
        self.run(&["reset", "--hard", "--quiet", "HEAD"])?;
        Ok(())
    }

    fn current_branch(&self) -> Result<String> {
        let output = self.output(&["symbolic-ref", "--short", "-q", "HEAD"])?;
        if !output.status.success() {
            return Err(ReplicationError::Configuration(
                "destination HEAD is detached; check out a branch first".to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn commit_messages_since(&self, path: &str) -> Result<Vec<String>> {
        let range = match self.last_commit_touching(path)? {
            Some(hash) => format!("{}..HEAD", hash),
            None => "HEAD".to_string(),
        };

        let stdout = self.run(&["log", "--format=%B%x00", &range])?;
        Ok(stdout
            .split('\0')
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn pull(&mut self, remote: &str, branch: &str) -> Result<()> {
        tracing::info!(remote, branch, "Pulling destination");
        self.run(&["pull", "--ff-only", "--quiet", remote, branch])?;
        Ok(())
    }

    fn push(&mut self, remote: &str, branch: &str) -> Result<()> {
        tracing::info!(remote, branch, "Pushing destination");
        self.run(&["push", "--quiet", remote, branch])?;
        Ok(())
    }
}
