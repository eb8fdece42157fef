//! Show checkpoint, bound and pending changesets

use anyhow::{Context, Result};
use ferry_cli::util::Workspace;
use ferry_core::DestinationWriter;
use ferry_sync::{GitDestination, MercurialHistory, Plan, Replicator};
use owo_colors::OwoColorize;
use std::path::PathBuf;

struct Status {
    branch: Option<String>,
    clean: bool,
    plan: Plan,
}

pub async fn run(dest: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::load(dest.as_deref(), config.as_deref())?;
    let config_source = workspace.config_source.to_string();

    let status = tokio::task::spawn_blocking(move || collect(workspace))
        .await
        .context("Status task failed")??;

    println!("{}", "Replication Status".bold());
    println!("{}: {}\n", "Config".dimmed(), config_source.dimmed());

    match &status.branch {
        Some(branch) => println!("  {:<12} {}", "Branch:", branch.cyan()),
        None => println!("  {:<12} {}", "Branch:", "detached HEAD".red()),
    }
    if status.clean {
        println!("  {:<12} {}", "Tree:", "clean".green());
    } else {
        println!("  {:<12} {}", "Tree:", "uncommitted changes".yellow());
    }

    let plan = &status.plan;
    println!(
        "  {:<12} {} {}",
        "Checkpoint:",
        plan.checkpoint.short().cyan(),
        format!("(rev {})", plan.checkpoint_seq).dimmed()
    );
    println!(
        "  {:<12} {} {}",
        "Bound:",
        plan.bound.short().cyan(),
        format!("(rev {})", plan.bound_seq).dimmed()
    );

    if plan.is_up_to_date() {
        println!("\n{} Up to date", "✓".green());
        return Ok(());
    }

    let pending: Vec<_> = plan.to_replicate().collect();
    println!(
        "\n{} pending, {} merge(s) and {} unrelated changeset(s) to skip",
        pending.len().to_string().bold(),
        plan.merges_skipped,
        plan.unrelated_skipped
    );
    for change in &pending {
        println!(
            "  {} {} {}",
            change.id.short().yellow(),
            change.summary,
            format!("({} file(s))", change.files.len()).dimmed()
        );
    }

    let applied = plan.pending.iter().filter(|p| p.already_applied).count();
    if applied > 0 {
        println!(
            "  {}",
            format!("{} already committed, will not be re-applied", applied).dimmed()
        );
    }

    Ok(())
}

fn collect(workspace: Workspace) -> Result<Status> {
    let clone = workspace.path(&workspace.config.source.clone_path);
    let dest = GitDestination::open(&workspace.root)?;
    let history = MercurialHistory::open(&clone)
        .with_context(|| format!("Cannot open source clone {}", clone.display()))?;
    let replicator = Replicator::from_config(history, dest, &workspace.config)?;

    let branch = replicator.destination().current_branch().ok();
    let clean = replicator.destination().is_clean()?;
    let plan = replicator.plan()?;

    Ok(Status {
        branch,
        clean,
        plan,
    })
}
