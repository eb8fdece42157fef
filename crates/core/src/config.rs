//! Replication configuration (`ferry.toml`)

use crate::error::{ReplicationError, Result};
use crate::paths::{default_prefix_rules, normalize_relative, PathMapper, PrefixRule};
use crate::transform::{default_rules, ContentTransformer, TransformRule};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete replication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub paths: Vec<PrefixRule>,
    pub transforms: Vec<TransformRule>,
    pub locales: LocaleConfig,
    pub changelog: ChangelogConfig,
}

/// Where source history comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Remote pulled before replicating
    pub url: String,
    /// Local clone, relative paths resolve against the destination root
    pub clone_path: PathBuf,
    /// Upper history bound
    pub branch: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "https://hg.mozilla.org/mozilla-central/".to_string(),
            clone_path: PathBuf::from("../mozilla-central"),
            branch: "default".to_string(),
        }
    }
}

/// Destination repository settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub remote: String,
    /// Checkpoint record, relative to the destination root
    pub checkpoint_file: String,
    /// Key of the source-id line appended to replicated commit messages
    pub trailer: String,
    /// Message of the commit that advances the checkpoint
    pub checkpoint_message: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            checkpoint_file: "last_m_c_import_rev.txt".to_string(),
            trailer: "mozilla-central hg revision".to_string(),
            checkpoint_message: "update latest merged cset file".to_string(),
        }
    }
}

/// Locale tree synchronization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    pub index_file: PathBuf,
    pub meta_name: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("../loop-client-l10n/l10n"),
            dest_dir: PathBuf::from("content/l10n"),
            index_file: PathBuf::from("content/index.html"),
            meta_name: "locales".to_string(),
        }
    }
}

/// Changelog side-channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangelogConfig {
    pub file: PathBuf,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("CHANGELOG"),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            paths: default_prefix_rules(),
            transforms: default_rules(),
            locales: LocaleConfig::default(),
            changelog: ChangelogConfig::default(),
        }
    }
}

impl ReplicationConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| ReplicationError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ReplicationError::Configuration(e.to_string()))
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        PathMapper::new(self.paths.clone())?;

        for rule in &self.transforms {
            normalize_relative(rule.path())?;
        }

        normalize_relative(&self.destination.checkpoint_file)?;
        if self.destination.trailer.trim().is_empty() || self.destination.trailer.contains(':') {
            return Err(ReplicationError::Configuration(format!(
                "trailer key '{}' must be non-empty and must not contain ':'",
                self.destination.trailer
            )));
        }
        if self.destination.checkpoint_message.trim().is_empty() {
            return Err(ReplicationError::Configuration(
                "checkpoint_message must not be empty".to_string(),
            ));
        }
        if self.destination.remote.trim().is_empty() {
            return Err(ReplicationError::Configuration(
                "destination remote must not be empty".to_string(),
            ));
        }
        if self.source.branch.trim().is_empty() {
            return Err(ReplicationError::Configuration(
                "source branch must not be empty".to_string(),
            ));
        }
        if self.locales.meta_name.trim().is_empty() {
            return Err(ReplicationError::Configuration(
                "locales.meta_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn mapper(&self) -> Result<PathMapper> {
        PathMapper::new(self.paths.clone())
    }

    pub fn transformer(&self) -> ContentTransformer {
        ContentTransformer::new(self.transforms.clone())
    }
}

/// Annotated example configuration (the built-in defaults)
pub fn example_config() -> String {
    r#"# ferry configuration
#
# Looked up as --config, then <destination>/ferry.toml, then
# <config dir>/ferry/config.toml. Missing keys take these defaults.

[source]
url = "https://hg.mozilla.org/mozilla-central/"
# Relative paths resolve against the destination root
clone_path = "../mozilla-central"
# Replicate up to and including this revision
branch = "default"

[destination]
remote = "origin"
checkpoint_file = "last_m_c_import_rev.txt"
trailer = "mozilla-central hg revision"
checkpoint_message = "update latest merged cset file"

# Tracked source prefixes and where they land. Longest prefix wins.
[[paths]]
source = "browser/components/loop/standalone/"
dest = ""

[[paths]]
source = "browser/components/loop/content/shared/"
dest = "content/shared/"

[[paths]]
source = "browser/components/loop/test/standalone/"
dest = "test/standalone/"

[[paths]]
source = "browser/components/loop/test/shared/"
dest = "test/shared/"

# Content rules, matched on the destination path, applied in order.
[[transforms]]
kind = "replace_text"
path = "test/standalone/index.html"
from = 'src="../../standalone/'
to = 'src="../../'

[[transforms]]
kind = "replace_text"
path = "test/shared/index.html"
from = 'src="../../standalone/'
to = 'src="../../'

[[transforms]]
kind = "preserve_locales"
path = "content/index.html"
meta_name = "locales"

# [[transforms]]
# kind = "strip_line"
# path = "package.json"
# line = '"some-dependency": "1.0.0",'

[locales]
source_dir = "../loop-client-l10n/l10n"
dest_dir = "content/l10n"
index_file = "content/index.html"
meta_name = "locales"

[changelog]
file = "CHANGELOG"
"#
    .to_string()
}
