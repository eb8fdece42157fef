//! Configuration command
//!
//! Shows the resolved configuration, where it was loaded from, and an
//! annotated example file.

use anyhow::Result;
use ferry_cli::util::{locate_config, user_config_path, Workspace, DEST_CONFIG_FILE};
use ferry_core::config::example_config;
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Print the effective configuration as TOML
pub async fn run_show(dest: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let workspace = Workspace::load(dest.as_deref(), config.as_deref())?;

    println!("{}", "Replication Configuration".bold());
    println!(
        "{}: {}\n",
        "Location".dimmed(),
        workspace.config_source.to_string().dimmed()
    );
    print!("{}", workspace.config.to_toml()?);

    Ok(())
}

/// Show which file would be used and the lookup order
pub async fn run_path(dest: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let root = match dest {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let source = locate_config(config.as_deref(), &root);
    println!("{}", source);

    println!("\n{}", "Lookup order:".bold());
    if let Some(flag) = &config {
        println!("  1. {} {}", flag.display(), "(--config)".dimmed());
    } else {
        println!("  1. {}", "--config FILE".dimmed());
    }
    println!("  2. {}", root.join(DEST_CONFIG_FILE).display());
    match user_config_path() {
        Some(path) => println!("  3. {}", path.display()),
        None => println!("  3. {}", "(no user config directory)".dimmed()),
    }
    println!("  4. {}", "built-in defaults".dimmed());

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    print!("{}", example_config());
    Ok(())
}
