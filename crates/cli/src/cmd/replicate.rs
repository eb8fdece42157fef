//! Replicate source history into the destination

use anyhow::{Context, Result};
use ferry_cli::util::Workspace;
use ferry_core::{Changeset, DestinationWriter, HistoryWalker};
use ferry_journal::{ReplicatedCommit, RunOutcome, RunReport};
use ferry_sync::{GitDestination, MercurialHistory, ReplicationObserver, Replicator};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Flags of `ferry replicate`
#[derive(Debug, Clone, Default)]
pub struct ReplicateArgs {
    pub push_result: bool,
    pub source_url: Option<String>,
    pub source_path: Option<PathBuf>,
    pub branch: Option<String>,
    pub no_pull_source: bool,
    pub no_pull_dest: bool,
    pub json: bool,
}

/// Progress bar over examined changesets
struct ProgressObserver {
    bar: ProgressBar,
    /// Print one line per replicated commit
    lines: bool,
}

impl ProgressObserver {
    fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar, lines: visible }
    }
}

impl ReplicationObserver for ProgressObserver {
    fn on_start(&mut self, pending: u64) {
        self.bar.set_length(pending);
    }

    fn on_examined(&mut self, changeset: &Changeset) {
        self.bar.inc(1);
        self.bar.set_message(changeset.id.short().to_string());
    }

    fn on_replicated(&mut self, commit: &ReplicatedCommit) {
        if !self.lines {
            return;
        }
        self.bar.suspend(|| {
            println!(
                "  {} {} {}",
                "✓".green(),
                commit.source.short().dimmed(),
                commit.summary
            )
        });
    }
}

pub async fn run(
    dest: Option<PathBuf>,
    config: Option<PathBuf>,
    args: ReplicateArgs,
) -> Result<()> {
    let mut workspace = Workspace::load(dest.as_deref(), config.as_deref())?;

    // Flags override the config file
    if let Some(url) = args.source_url.clone() {
        workspace.config.source.url = url;
    }
    if let Some(path) = args.source_path.clone() {
        workspace.config.source.clone_path = path;
    }
    if let Some(branch) = args.branch.clone() {
        workspace.config.source.branch = branch;
    }
    workspace.config.validate()?;

    if !args.json {
        println!(
            "{} {} {}",
            "Replicating".bold(),
            workspace.config.source.url.cyan(),
            format!("({})", workspace.config.source.branch).dimmed()
        );
    }

    let json = args.json;
    let report = tokio::task::spawn_blocking(move || replicate(workspace, args))
        .await
        .context("Replication task failed")??;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn replicate(workspace: Workspace, args: ReplicateArgs) -> Result<RunReport> {
    let config = &workspace.config;
    let clone = workspace.path(&config.source.clone_path);

    let dest = GitDestination::open(&workspace.root)?;
    let history = MercurialHistory::open(&clone)
        .with_context(|| format!("Cannot open source clone {}", clone.display()))?;
    let mut replicator = Replicator::from_config(history, dest, config)?;

    let branch = replicator.preflight()?;
    if !args.no_pull_dest {
        replicator
            .destination_mut()
            .pull(&config.destination.remote, &branch)?;
    }
    if !args.no_pull_source {
        replicator
            .history_mut()
            .pull(&config.source.url, &config.source.branch)?;
    }

    let mut observer = ProgressObserver::new(!args.json);
    let result = replicator.run(&mut observer);
    observer.bar.finish_and_clear();
    let report = result?;

    if args.push_result {
        if report.outcome == RunOutcome::Replicated {
            replicator
                .destination_mut()
                .push(&config.destination.remote, &branch)?;
        } else {
            tracing::info!("Nothing replicated, skipping push");
        }
    }

    Ok(report)
}

fn print_report(report: &RunReport) {
    match report.outcome {
        RunOutcome::UpToDate => {
            println!(
                "{} already at {}",
                "✓".green(),
                report.checkpoint.short().cyan()
            );
        }
        RunOutcome::NoRelevantChanges => {
            println!(
                "{} {} changesets examined, none touch tracked paths",
                "✓".green(),
                report.examined
            );
            println!("  {}", "Checkpoint unchanged".dimmed());
        }
        RunOutcome::Replicated => {
            println!(
                "{} Replicated {} changeset(s) onto {}",
                "✓".green(),
                report.commits.len(),
                report.branch.cyan()
            );
            if report.already_applied > 0 {
                println!(
                    "  {} {}",
                    report.already_applied,
                    "already committed by an earlier run".dimmed()
                );
            }
            println!(
                "  {} {} → {}",
                "Checkpoint:".dimmed(),
                report.previous_checkpoint.short(),
                report.checkpoint.short().cyan()
            );
        }
    }

    if report.merges_skipped > 0 {
        println!("  {} merge(s) skipped", report.merges_skipped);
    }
}
