//! Locale tree synchronization
//!
//! Replaces the destination locale tree with the locale directories of a
//! localization checkout and registers the resulting list in the index page.

use anyhow::{Context, Result};
use ferry_core::locale;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Locale directories that are never copied
const SKIPPED: &[&str] = &["templates"];

/// Inputs of one locale sync
#[derive(Debug, Clone)]
pub struct LocaleSync {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub index_file: PathBuf,
    pub meta_name: String,
}

/// What a sync did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSyncReport {
    /// Destination locale names, sorted
    pub locales: Vec<String>,
    pub files_copied: usize,
}

/// Destination name of a locale directory (`pt_BR` → `pt-BR`)
pub fn locale_name(dir_name: &str) -> String {
    dir_name.replace('_', "-")
}

impl LocaleSync {
    pub fn run(&self) -> Result<LocaleSyncReport> {
        if !self.source_dir.is_dir() {
            anyhow::bail!(
                "Locale source {} is not a directory",
                self.source_dir.display()
            );
        }

        if self.dest_dir.exists() {
            tracing::info!(path = %self.dest_dir.display(), "Deleting existing locale tree");
            std::fs::remove_dir_all(&self.dest_dir)
                .with_context(|| format!("Failed to remove {}", self.dest_dir.display()))?;
        }

        let mut locales = Vec::new();
        let mut files_copied = 0;

        let entries = std::fs::read_dir(&self.source_dir)
            .with_context(|| format!("Failed to read {}", self.source_dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || SKIPPED.contains(&name.as_str()) {
                continue;
            }
            if !entry.file_type()?.is_dir() {
                tracing::debug!(name, "Skipping non-directory in locale source");
                continue;
            }

            let target = locale_name(&name);
            files_copied += copy_tree(&entry.path(), &self.dest_dir.join(&target))?;
            locales.push(target);
        }

        locales.sort();
        self.register(&locales)?;

        Ok(LocaleSyncReport {
            locales,
            files_copied,
        })
    }

    /// Write the comma-joined locale list into the index page
    fn register(&self, locales: &[String]) -> Result<()> {
        let html = std::fs::read_to_string(&self.index_file)
            .with_context(|| format!("Failed to read {}", self.index_file.display()))?;

        let updated = locale::replace_content(&html, &self.meta_name, &locales.join(","))
            .with_context(|| format!("Cannot update locale list in {}", self.index_file.display()))?;

        std::fs::write(&self.index_file, updated)
            .with_context(|| format!("Failed to write {}", self.index_file.display()))?;
        tracing::info!(count = locales.len(), path = %self.index_file.display(), "Updated locale list");
        Ok(())
    }
}

/// Copy a directory recursively, returning the number of files copied
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(from) {
        let entry = entry.with_context(|| format!("Failed to walk {}", from.display()))?;
        let relative = entry.path().strip_prefix(from)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
            copied += 1;
        }
    }

    Ok(copied)
}
