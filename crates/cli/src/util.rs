//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use ferry_core::ReplicationConfig;
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up at the destination root
pub const DEST_CONFIG_FILE: &str = "ferry.toml";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config FILE`
    Flag(PathBuf),
    /// `<dest>/ferry.toml`
    Destination(PathBuf),
    /// `<config dir>/ferry/config.toml`
    User(PathBuf),
    /// Nothing found, built-in defaults
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Flag(path) | ConfigSource::Destination(path) | ConfigSource::User(path) => {
                Some(path)
            }
            ConfigSource::Defaults => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => f.write_str("built-in defaults"),
        }
    }
}

/// Per-user config file location
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ferry").join("config.toml"))
}

/// Pick the configuration file, first match wins
///
/// `--config` is used even when it does not exist, so a typo surfaces as a
/// load error instead of silently falling back.
pub fn locate_config(explicit: Option<&Path>, dest_root: &Path) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::Flag(path.to_path_buf());
    }

    let in_dest = dest_root.join(DEST_CONFIG_FILE);
    if in_dest.is_file() {
        return ConfigSource::Destination(in_dest);
    }

    match user_config_path() {
        Some(path) if path.is_file() => ConfigSource::User(path),
        _ => ConfigSource::Defaults,
    }
}

/// Resolve `path` against the destination root unless it is absolute
pub fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Destination root, configuration and where it came from
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: ReplicationConfig,
    pub config_source: ConfigSource,
}

impl Workspace {
    /// Resolve the destination root (default: current directory) and load
    /// its configuration
    pub fn load(dest: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let root = match dest {
            Some(dir) => dir.to_path_buf(),
            None => std::env::current_dir().context("Failed to get current directory")?,
        };
        if !root.is_dir() {
            anyhow::bail!("Destination {} is not a directory", root.display());
        }

        let config_source = locate_config(config, &root);
        let config = match config_source.path() {
            Some(path) => ReplicationConfig::load(path)?,
            None => ReplicationConfig::default(),
        };
        tracing::debug!(source = %config_source, "Loaded configuration");

        Ok(Self {
            root,
            config,
            config_source,
        })
    }

    /// A configured path, resolved against the destination root
    pub fn path(&self, configured: &Path) -> PathBuf {
        resolve_against(&self.root, configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_config_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEST_CONFIG_FILE), "").unwrap();

        let explicit = dir.path().join("other.toml");
        assert_eq!(
            locate_config(Some(&explicit), dir.path()),
            ConfigSource::Flag(explicit)
        );
        assert_eq!(
            locate_config(None, dir.path()),
            ConfigSource::Destination(dir.path().join(DEST_CONFIG_FILE))
        );
    }

    #[test]
    fn test_workspace_loads_destination_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEST_CONFIG_FILE),
            "[source]\nclone_path = \"../hg/clone\"\n",
        )
        .unwrap();

        let workspace = Workspace::load(Some(dir.path()), None).unwrap();
        assert_eq!(
            workspace.path(&workspace.config.source.clone_path),
            dir.path().join("../hg/clone")
        );
        assert!(matches!(workspace.config_source, ConfigSource::Destination(_)));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(Workspace::load(Some(dir.path()), Some(&missing)).is_err());
    }

    #[test]
    fn test_resolve_against() {
        let root = Path::new("/repo");
        assert_eq!(resolve_against(root, Path::new("a/b")), PathBuf::from("/repo/a/b"));
        let absolute = std::env::temp_dir();
        assert_eq!(resolve_against(root, &absolute), absolute);
    }
}
