//! Mercurial source history via the `hg` command-line tool

use crate::command::{capture, create_command, stderr_of};
use ferry_core::{Changeset, ChangesetId, HistoryWalker, ReplicationError, Result, Timestamp};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `HistoryWalker` over a local Mercurial clone
#[derive(Debug, Clone)]
pub struct MercurialHistory {
    clone: PathBuf,
}

/// One entry of `hg log -T json -v`
#[derive(Debug, Deserialize)]
struct LogEntry {
    rev: u64,
    node: String,
    #[serde(default)]
    parents: Vec<String>,
    user: String,
    /// `[unix seconds, offset west of UTC]`
    date: (f64, i32),
    desc: String,
    #[serde(default)]
    files: Vec<String>,
}

impl MercurialHistory {
    /// Open an existing clone
    pub fn open(clone: impl AsRef<Path>) -> Result<Self> {
        let clone = clone.as_ref();
        if !clone.join(".hg").is_dir() {
            return Err(ReplicationError::Configuration(format!(
                "{} is not a Mercurial clone",
                clone.display()
            )));
        }
        Ok(Self {
            clone: clone.to_path_buf(),
        })
    }

    pub fn clone_path(&self) -> &Path {
        &self.clone
    }

    fn hg(&self) -> Command {
        let mut cmd = create_command("hg");
        cmd.arg("-R").arg(&self.clone);
        cmd
    }

    /// Run an `hg` subcommand, returning stdout or classifying the failure
    fn run(&self, args: &[&str], reference: &str) -> Result<Vec<u8>> {
        let output = capture(self.hg().args(args))
            .map_err(|e| ReplicationError::SourceRead(format!("failed to run hg: {}", e)))?;

        if output.status.success() {
            return Ok(output.stdout);
        }

        let stderr = stderr_of(&output);
        if stderr.contains("unknown revision") || stderr.contains("ambiguous identifier") {
            Err(ReplicationError::UnknownRevision(reference.to_string()))
        } else {
            Err(ReplicationError::SourceRead(format!(
                "hg {} failed: {}",
                args.first().copied().unwrap_or_default(),
                stderr
            )))
        }
    }
}

impl HistoryWalker for MercurialHistory {
    fn resolve(&self, reference: &str) -> Result<(ChangesetId, u64)> {
        let stdout = self.run(&["log", "-r", reference, "-T", "{rev}:{node}\\n"], reference)?;
        let text = String::from_utf8_lossy(&stdout);
        let line = text
            .lines()
            .last()
            .ok_or_else(|| ReplicationError::UnknownRevision(reference.to_string()))?;
        parse_rev_node(line)
    }

    fn changeset_at(&self, seq: u64) -> Result<Changeset> {
        let rev = seq.to_string();
        let stdout = self.run(&["log", "-r", &rev, "-T", "json", "-v"], &rev)?;
        parse_log(&stdout)?
            .into_iter()
            .next()
            .ok_or_else(|| ReplicationError::SourceRead(format!("no changeset at {}", seq)))
    }

    fn content_of(&self, changeset: &Changeset, path: &str) -> Result<Option<Vec<u8>>> {
        let pattern = format!("path:{}", path);
        let output = capture(
            self.hg()
                .args(["cat", "-r", changeset.id.as_str()])
                .arg(&pattern),
        )
        .map_err(|e| ReplicationError::SourceRead(format!("failed to run hg: {}", e)))?;

        if output.status.success() {
            return Ok(Some(output.stdout));
        }

        let stderr = stderr_of(&output);
        if stderr.contains("no such file in rev") {
            tracing::debug!(path, changeset = %changeset.id.short(), "File absent at changeset");
            Ok(None)
        } else {
            Err(ReplicationError::SourceRead(format!(
                "hg cat {} at {} failed: {}",
                path,
                changeset.id.short(),
                stderr
            )))
        }
    }

    fn latest_seq(&self) -> Result<u64> {
        let stdout = self.run(&["log", "-r", "tip", "-T", "{rev}"], "tip")?;
        let text = String::from_utf8_lossy(&stdout);
        text.trim()
            .parse::<u64>()
            .map_err(|_| ReplicationError::SourceRead(format!("unexpected tip revision '{}'", text.trim())))
    }

    fn pull(&mut self, remote_url: &str, branch: &str) -> Result<()> {
        // `incoming` exits 1 when there is nothing to pull
        let output = capture(
            self.hg()
                .args(["incoming", "--quiet", "-b", branch, remote_url]),
        )
        .map_err(|e| ReplicationError::SourceRead(format!("failed to run hg: {}", e)))?;

        match output.status.code() {
            Some(0) => {}
            Some(1) => {
                tracing::info!(remote = remote_url, "Source clone already up to date");
                return Ok(());
            }
            _ => {
                return Err(ReplicationError::SourceRead(format!(
                    "hg incoming from {} failed: {}",
                    remote_url,
                    stderr_of(&output)
                )))
            }
        }

        tracing::info!(remote = remote_url, branch, "Pulling source history");
        self.run(&["pull", "--quiet", "-b", branch, remote_url], branch)?;
        Ok(())
    }
}

fn parse_rev_node(line: &str) -> Result<(ChangesetId, u64)> {
    let malformed = || ReplicationError::SourceRead(format!("unexpected hg output '{}'", line));
    let (rev, node) = line.trim().split_once(':').ok_or_else(malformed)?;
    let seq = rev.parse::<u64>().map_err(|_| malformed())?;
    let id = ChangesetId::parse(node).map_err(|_| malformed())?;
    Ok((id, seq))
}

/// Parse `hg log -T json -v` output
fn parse_log(json: &[u8]) -> Result<Vec<Changeset>> {
    let entries: Vec<LogEntry> = serde_json::from_slice(json)
        .map_err(|e| ReplicationError::SourceRead(format!("cannot parse hg log output: {}", e)))?;

    entries
        .into_iter()
        .map(|entry| {
            let id = ChangesetId::parse(&entry.node)
                .map_err(|e| ReplicationError::SourceRead(e.to_string()))?;

            let mut parents = Vec::with_capacity(entry.parents.len());
            for parent in &entry.parents {
                let parent = ChangesetId::parse(parent)
                    .map_err(|e| ReplicationError::SourceRead(e.to_string()))?;
                if !parent.is_null() {
                    parents.push(parent);
                }
            }

            Ok(Changeset {
                id,
                seq: entry.rev,
                parents,
                author: entry.user,
                timestamp: Timestamp::new(entry.date.0 as i64, entry.date.1),
                description: entry.desc,
                files: entry.files,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::tool_available;

    const NODE_A: &str = "1111111111111111111111111111111111111111";
    const NODE_B: &str = "2222222222222222222222222222222222222222";
    const NULL: &str = "0000000000000000000000000000000000000000";

    #[test]
    fn test_parse_log() {
        let json = format!(
            r#"[
             {{
              "bookmarks": [],
              "branch": "default",
              "date": [1436270400.0, -7200],
              "desc": "Bug 1180179 - Part 1: update standalone r=Standard8",
              "files": ["browser/components/loop/standalone/index.html", "dom/base/x.cpp"],
              "node": "{b}",
              "parents": ["{a}"],
              "phase": "public",
              "rev": 42,
              "tags": ["tip"],
              "user": "Jane Doe <jane@example.com>"
             }}
            ]"#,
            a = NODE_A,
            b = NODE_B
        );

        let changesets = parse_log(json.as_bytes()).unwrap();
        assert_eq!(changesets.len(), 1);
        let cs = &changesets[0];
        assert_eq!(cs.seq, 42);
        assert_eq!(cs.id.as_str(), NODE_B);
        assert_eq!(cs.parents, vec![ChangesetId::parse(NODE_A).unwrap()]);
        assert_eq!(cs.timestamp, Timestamp::new(1_436_270_400, -7200));
        assert_eq!(cs.files.len(), 2);
        assert!(!cs.is_merge());
    }

    #[test]
    fn test_parse_log_drops_null_parents() {
        let json = format!(
            r#"[{{"rev": 0, "node": "{a}", "parents": ["{null}", "{null}"],
                 "user": "root", "date": [0, 0], "desc": "initial", "files": []}}]"#,
            a = NODE_A,
            null = NULL
        );
        let cs = &parse_log(json.as_bytes()).unwrap()[0];
        assert!(cs.parents.is_empty());
    }

    #[test]
    fn test_parse_log_merge() {
        let json = format!(
            r#"[{{"rev": 9, "node": "{b}", "parents": ["{a}", "{b}"],
                 "user": "x", "date": [5, 0], "desc": "Merge m-c to fx-team"}}]"#,
            a = NODE_A,
            b = NODE_B
        );
        let cs = &parse_log(json.as_bytes()).unwrap()[0];
        assert!(cs.is_merge());
        assert!(cs.files.is_empty());
    }

    #[test]
    fn test_parse_log_rejects_garbage() {
        assert!(matches!(
            parse_log(b"abort: repository not found"),
            Err(ReplicationError::SourceRead(_))
        ));
    }

    #[test]
    fn test_parse_rev_node() {
        let (id, seq) = parse_rev_node(&format!("17:{}", NODE_A)).unwrap();
        assert_eq!(seq, 17);
        assert_eq!(id.as_str(), NODE_A);
        assert!(parse_rev_node("garbage").is_err());
    }

    #[test]
    fn test_open_requires_clone() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MercurialHistory::open(dir.path()),
            Err(ReplicationError::Configuration(_))
        ));
    }

    fn hg(dir: &Path, args: &[&str]) {
        let status = create_command("hg")
            .arg("-R")
            .arg(dir)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "hg {:?} failed", args);
    }

    #[test]
    fn test_real_clone() {
        if !tool_available("hg") {
            eprintln!("hg not available, skipping");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let status = create_command("hg").arg("init").arg(dir.path()).status().unwrap();
        assert!(status.success());

        std::fs::write(dir.path().join("a.txt"), "one\n").unwrap();
        hg(
            dir.path(),
            &["commit", "-A", "-m", "add a", "-u", "Jane <jane@example.com>", "-d", "1436270400 -7200"],
        );
        std::fs::remove_file(dir.path().join("a.txt")).unwrap();
        hg(dir.path(), &["commit", "-A", "-m", "remove a", "-u", "Jane <jane@example.com>"]);

        let history = MercurialHistory::open(dir.path()).unwrap();
        assert_eq!(history.latest_seq().unwrap(), 1);

        let (tip, seq) = history.resolve("default").unwrap();
        assert_eq!(seq, 1);

        let first = history.changeset_at(0).unwrap();
        assert_eq!(first.author, "Jane <jane@example.com>");
        assert_eq!(first.timestamp, Timestamp::new(1_436_270_400, -7200));
        assert_eq!(first.files, vec!["a.txt".to_string()]);
        assert_eq!(
            history.content_of(&first, "a.txt").unwrap(),
            Some(b"one\n".to_vec())
        );

        let second = history.changeset_at(1).unwrap();
        assert_eq!(second.id, tip);
        assert_eq!(second.parents, vec![first.id.clone()]);
        assert_eq!(history.content_of(&second, "a.txt").unwrap(), None);

        assert!(matches!(
            history.resolve("ffffffffffff"),
            Err(ReplicationError::UnknownRevision(_))
        ));
    }
}
