//! End-to-end tests of the `ferry` binary

mod common;

use anyhow::Result;
use common::repos::{commit_file, git, git_repo, hg_commit, hg_node, hg_repo};
use ferry_core::ReplicationConfig;
use std::fs;

#[test]
fn test_config_example_is_the_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = ferry!(dir.path(), "config", "example").succeeds()?;

    let parsed = ReplicationConfig::from_toml(&result.stdout)?;
    assert_eq!(parsed, ReplicationConfig::default());
    Ok(())
}

#[test]
fn test_config_show_reads_destination_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("ferry.toml"),
        "[source]\nbranch = \"release\"\n",
    )?;

    let result = ferry!(dir.path(), "config", "show").succeeds()?;
    assert!(result.stdout.contains("branch = \"release\""));
    assert!(result.stdout.contains("ferry.toml"));
    Ok(())
}

#[test]
fn test_config_path_without_files_uses_defaults() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = ferry!(dir.path(), "config", "path").succeeds()?;
    assert!(result.stdout.starts_with("built-in defaults"));
    assert!(result.stdout.contains("Lookup order:"));
    Ok(())
}

#[test]
fn test_missing_config_flag_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = ferry!(dir.path(), "--config", "nope.toml", "config", "show").fails_with(1)?;
    assert!(result.stderr.contains("nope.toml"));
    Ok(())
}

#[test]
fn test_invalid_config_is_a_configuration_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("ferry.toml"),
        "[destination]\ntrailer = \"has: colon\"\n",
    )?;

    let result = ferry!(dir.path(), "replicate", "--no-pull-source").fails_with(2)?;
    assert!(result.stderr.contains("trailer key"));
    Ok(())
}

#[test]
fn test_replicate_outside_git_exits_with_configuration_code() -> Result<()> {
    if git_repo().is_none() {
        return Ok(());
    }

    let dir = tempfile::tempdir()?;
    let result = ferry!(dir.path(), "replicate", "--no-pull-source", "--no-pull-dest")
        .fails_with(2)?;
    assert!(result.stderr.contains("error:"));
    Ok(())
}

#[test]
fn test_status_without_source_clone_exits_with_configuration_code() -> Result<()> {
    let Some(dest) = git_repo() else {
        return Ok(());
    };

    // An explicit --config that does not exist is not a replication error
    ferry!(dest.path(), "--config", "ferry.toml", "status").fails_with(1)?;

    fs::write(
        dest.path().join("ferry.toml"),
        "[source]\nclone_path = \"no-such-clone\"\n",
    )?;
    let result = ferry!(dest.path(), "status").fails_with(2)?;
    assert!(result.stderr.contains("no-such-clone"));
    Ok(())
}

#[test]
fn test_locales_end_to_end() -> Result<()> {
    let root = tempfile::tempdir()?;
    let l10n = root.path().join("l10n");
    for (dir, file) in [
        ("en_US", "app.properties"),
        ("fr", "app.properties"),
        ("templates", "app.properties"),
        (".git", "config"),
    ] {
        fs::create_dir_all(l10n.join(dir))?;
        fs::write(l10n.join(dir).join(file), "key=value\n")?;
    }

    let dest = root.path().join("dest");
    fs::create_dir_all(dest.join("content/l10n/stale"))?;
    fs::write(
        dest.join("content/index.html"),
        "<html><head><meta name=\"locales\" content=\"en-US\" /></head></html>\n",
    )?;

    let result = ferry!(root.path(), "-C", &dest, "locales", "--src", &l10n)
        .succeeds()?;
    assert!(result.stdout.contains("2 locale(s)"));

    assert!(dest.join("content/l10n/en-US/app.properties").is_file());
    assert!(dest.join("content/l10n/fr/app.properties").is_file());
    assert!(!dest.join("content/l10n/templates").exists());
    assert!(!dest.join("content/l10n/stale").exists());

    let index = fs::read_to_string(dest.join("content/index.html"))?;
    assert!(index.contains("content=\"en-US,fr\""));
    Ok(())
}

#[test]
fn test_changelog_prepends_new_subjects() -> Result<()> {
    let Some(dest) = git_repo() else {
        return Ok(());
    };
    let dir = dest.path();

    commit_file(dir, "CHANGELOG", "- Older entry\n", "Start changelog");
    commit_file(dir, "a.js", "a\n", "Bug 123 - Fix the thing r=bob");
    commit_file(dir, "last_m_c_import_rev.txt", "x\n", "update latest merged cset file");

    ferry!(dir, "changelog").succeeds()?;
    assert_eq!(
        fs::read_to_string(dir.join("CHANGELOG"))?,
        "- Bug 123 - Fix the thing\n- Older entry\n"
    );

    // Nothing new once the changelog itself is committed
    git(dir, &["commit", "-q", "-am", "Update changelog"]);
    let result = ferry!(dir, "changelog").succeeds()?;
    assert!(result.stdout.contains("No new entries"));
    Ok(())
}

#[test]
fn test_replicate_from_mercurial_into_git() -> Result<()> {
    let (Some(dest), Some(source)) = (git_repo(), hg_repo()) else {
        return Ok(());
    };
    let src = source.path();

    hg_commit(src, &[("browser/components/loop/standalone/app.js", "v0\n")], "Start");
    hg_commit(
        src,
        &[
            ("browser/components/loop/standalone/app.js", "v1\n"),
            ("browser/base/unrelated.js", "x\n"),
        ],
        "Bug 42 - Update app r=alice",
    );
    hg_commit(src, &[("browser/base/unrelated.js", "y\n")], "Unrelated change");
    hg_commit(
        src,
        &[("browser/components/loop/content/shared/js/util.js", "util\n")],
        "Bug 43 - Add shared util",
    );

    let checkpoint = hg_node(src, "0");
    let bound = hg_node(src, "tip");
    commit_file(
        dest.path(),
        "last_m_c_import_rev.txt",
        &format!("{}\n", checkpoint),
        "seed checkpoint",
    );

    let result = ferry!(
        dest.path(),
        "replicate",
        "--source-path",
        src,
        "--no-pull-source",
        "--no-pull-dest",
        "--json"
    )
    .succeeds()?;

    let report: serde_json::Value = serde_json::from_str(&result.stdout)?;
    assert_eq!(report["outcome"], "replicated");
    assert_eq!(report["commits"].as_array().map(Vec::len), Some(2));
    assert_eq!(report["unrelated_skipped"], 1);

    let dir = dest.path();
    assert_eq!(fs::read_to_string(dir.join("app.js"))?, "v1\n");
    assert_eq!(fs::read_to_string(dir.join("content/shared/js/util.js"))?, "util\n");
    assert!(!dir.join("browser").exists());
    assert_eq!(
        fs::read_to_string(dir.join("last_m_c_import_rev.txt"))?.trim(),
        bound
    );

    let messages = git(dir, &["log", "--format=%B%x00", "-3"]);
    let subjects: Vec<_> = messages
        .split('\0')
        .filter_map(|message| message.trim().lines().next())
        .collect();
    assert_eq!(
        subjects,
        vec![
            "update latest merged cset file",
            "Bug 43 - Add shared util",
            "Bug 42 - Update app r=alice",
        ]
    );
    let body = git(dir, &["log", "-1", "--skip=1", "--format=%B"]);
    assert!(body.contains("mozilla-central hg revision: "));

    // Second run finds nothing to do
    let result = ferry!(
        dir,
        "replicate",
        "--source-path",
        src,
        "--no-pull-source",
        "--no-pull-dest",
        "--json"
    )
    .succeeds()?;
    let report: serde_json::Value = serde_json::from_str(&result.stdout)?;
    assert_eq!(report["outcome"], "up_to_date");
    Ok(())
}
