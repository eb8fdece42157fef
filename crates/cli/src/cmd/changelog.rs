//! Prepend replicated commit subjects to the changelog

use anyhow::{Context, Result};
use ferry_cli::changelog;
use ferry_cli::util::Workspace;
use ferry_sync::GitDestination;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(
    dest: Option<PathBuf>,
    config: Option<PathBuf>,
    since: Option<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(dest.as_deref(), config.as_deref())?;
    let file = file.unwrap_or_else(|| workspace.config.changelog.file.clone());
    let path = workspace.path(&file);
    let repo = GitDestination::open(&workspace.root)?;

    // Default range: everything since the changelog itself last changed
    let since = match since {
        Some(rev) => Some(rev),
        None => {
            let relative = path.strip_prefix(repo.root()).unwrap_or(file.as_path());
            repo.last_commit_touching(&relative.to_string_lossy())?
        }
    };

    let subjects = repo.log_subjects(since.as_deref())?;
    let entries = changelog::entries(&subjects, &workspace.config.destination.checkpoint_message);
    if entries.is_empty() {
        println!("{} No new entries for {}", "✓".green(), path.display());
        return Ok(());
    }

    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    std::fs::write(&path, changelog::prepend(&existing, &entries))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Added {} entr{} to {}",
        "✓".green(),
        entries.len(),
        if entries.len() == 1 { "y" } else { "ies" },
        path.display()
    );
    for entry in &entries {
        println!("  {} {}", "-".dimmed(), entry);
    }

    Ok(())
}
