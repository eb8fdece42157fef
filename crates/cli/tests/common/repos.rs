//! Scratch Git and Mercurial repositories

use ferry_sync::command::{create_command, tool_available};
use std::path::Path;
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = create_command("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn hg(dir: &Path, args: &[&str]) {
    let output = create_command("hg")
        .arg("-R")
        .arg(dir)
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "hg {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Git repository on `main` with one commit, `None` without git
pub fn git_repo() -> Option<TempDir> {
    if !tool_available("git") {
        eprintln!("git not available, skipping");
        return None;
    }

    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir.path(), &["config", "user.name", "Ferry Test"]);
    git(dir.path(), &["config", "user.email", "ferry@example.com"]);
    git(dir.path(), &["config", "commit.gpgsign", "false"]);
    commit_file(dir.path(), "README", "readme\n", "initial");
    Some(dir)
}

pub fn commit_file(dir: &Path, path: &str, content: &str, message: &str) {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
    git(dir, &["add", "--", path]);
    git(dir, &["commit", "-q", "-m", message]);
}

/// Empty Mercurial repository, `None` without hg
pub fn hg_repo() -> Option<TempDir> {
    if !tool_available("hg") {
        eprintln!("hg not available, skipping");
        return None;
    }

    let dir = tempfile::tempdir().unwrap();
    let status = create_command("hg").arg("init").arg(dir.path()).status().unwrap();
    assert!(status.success());
    Some(dir)
}

pub fn hg_commit(dir: &Path, files: &[(&str, &str)], message: &str) {
    for (path, content) in files {
        let full = dir.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    hg(
        dir,
        &["commit", "-A", "-m", message, "-u", "Jane Doe <jane@example.com>"],
    );
}

/// Node of a Mercurial revision
pub fn hg_node(dir: &Path, rev: &str) -> String {
    let output = create_command("hg")
        .arg("-R")
        .arg(dir)
        .args(["log", "-r", rev, "-T", "{node}"])
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
