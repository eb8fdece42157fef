//! ferry - incremental history replication

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ferry_core::ReplicationError;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cmd;

/// ferry - Replicate a filtered slice of Mercurial history into Git
#[derive(Parser)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Destination repository root (default: current directory)
    #[arg(short = 'C', long = "dest", global = true, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Configuration file (default: <dest>/ferry.toml, then the user config)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate new source changesets into the destination
    Replicate {
        /// Push the destination branch after a successful run
        #[arg(long)]
        push_result: bool,
        /// Source repository URL to pull from
        #[arg(long, value_name = "URL")]
        source_url: Option<String>,
        /// Local source clone
        #[arg(long, value_name = "PATH")]
        source_path: Option<PathBuf>,
        /// Replicate up to this source revision
        #[arg(long, value_name = "REF")]
        branch: Option<String>,
        /// Don't pull the source clone first
        #[arg(long)]
        no_pull_source: bool,
        /// Don't pull the destination first
        #[arg(long)]
        no_pull_dest: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show checkpoint, bound and pending changesets
    Status,
    /// Update the locale tree from a localization checkout
    Locales {
        /// Locale source directory
        #[arg(long, value_name = "DIR")]
        src: Option<PathBuf>,
        /// Destination locale directory
        #[arg(long, value_name = "DIR")]
        dst: Option<PathBuf>,
        /// Page whose locale list is updated
        #[arg(long, value_name = "FILE")]
        index_file: Option<PathBuf>,
    },
    /// Prepend new commit subjects to the changelog
    Changelog {
        /// Start after this destination revision (default: last changelog update)
        #[arg(long, value_name = "REV")]
        since: Option<String>,
        /// Changelog file
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Show which config file is used
    Path,
    /// Print an annotated example configuration
    Example,
}

/// Initialize tracing; the returned guard flushes the log file on drop
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let default_level = match (verbose, log_file.is_some()) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = if verbose {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .context("--log-file must name a file")?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .init();
            Ok(None)
        }
    }
}

/// Exit code for a failed command, taken from the replication error if any
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ReplicationError>())
        .map(ReplicationError::exit_code)
        .unwrap_or(1)
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { dest, config, command, .. } = cli;

    match command {
        Commands::Replicate {
            push_result,
            source_url,
            source_path,
            branch,
            no_pull_source,
            no_pull_dest,
            json,
        } => {
            let args = cmd::replicate::ReplicateArgs {
                push_result,
                source_url,
                source_path,
                branch,
                no_pull_source,
                no_pull_dest,
                json,
            };
            cmd::replicate::run(dest, config, args).await
        }
        Commands::Status => cmd::status::run(dest, config).await,
        Commands::Locales { src, dst, index_file } => {
            cmd::locales::run(dest, config, src, dst, index_file).await
        }
        Commands::Changelog { since, file } => cmd::changelog::run(dest, config, since, file).await,
        Commands::Config { action } => match action.unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => cmd::config::run_show(dest, config).await,
            ConfigCommands::Path => cmd::config::run_path(dest, config).await,
            ConfigCommands::Example => cmd::config::run_example().await,
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match init_tracing(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{:#}", err), "Command failed");
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(exit_code(&err))
        }
    }
}
