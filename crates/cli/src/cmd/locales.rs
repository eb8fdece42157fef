//! Synchronize the locale tree from a localization checkout

use anyhow::{Context, Result};
use ferry_cli::locales::LocaleSync;
use ferry_cli::util::Workspace;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(
    dest: Option<PathBuf>,
    config: Option<PathBuf>,
    src: Option<PathBuf>,
    dst: Option<PathBuf>,
    index_file: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::load(dest.as_deref(), config.as_deref())?;
    let locales = &workspace.config.locales;

    let sync = LocaleSync {
        source_dir: workspace.path(src.as_ref().unwrap_or(&locales.source_dir)),
        dest_dir: workspace.path(dst.as_ref().unwrap_or(&locales.dest_dir)),
        index_file: workspace.path(index_file.as_ref().unwrap_or(&locales.index_file)),
        meta_name: locales.meta_name.clone(),
    };

    println!(
        "{} {} → {}",
        "Updating locales".bold(),
        sync.source_dir.display().dimmed(),
        sync.dest_dir.display()
    );

    let report = tokio::task::spawn_blocking(move || sync.run())
        .await
        .context("Locale sync task failed")??;

    println!(
        "{} {} locale(s), {} file(s) copied",
        "✓".green(),
        report.locales.len(),
        report.files_copied
    );
    println!("  {}", report.locales.join(",").dimmed());

    Ok(())
}
