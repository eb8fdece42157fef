//! Path filtering and source → destination path mapping
//!
//! The filter and the mapper share a single prefix table: a path is tracked
//! exactly when some rule's source prefix matches it, so every accepted path
//! has a rewrite.

use crate::changeset::TrackedFile;
use crate::error::{ReplicationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// One prefix substitution: `source` is replaced by `dest`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub source: String,
    #[serde(default)]
    pub dest: String,
}

impl PrefixRule {
    pub fn new(source: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }
}

/// The prefix table of the Loop standalone client layout
pub fn default_prefix_rules() -> Vec<PrefixRule> {
    vec![
        PrefixRule::new("browser/components/loop/standalone/", ""),
        PrefixRule::new("browser/components/loop/content/shared/", "content/shared/"),
        PrefixRule::new("browser/components/loop/test/standalone/", "test/standalone/"),
        PrefixRule::new("browser/components/loop/test/shared/", "test/shared/"),
    ]
}

/// Maps tracked source paths into the destination tree
#[derive(Debug, Clone)]
pub struct PathMapper {
    /// Sorted by source prefix length, longest first
    rules: Vec<PrefixRule>,
}

impl PathMapper {
    /// Build a mapper after validating the prefix table
    pub fn new(rules: Vec<PrefixRule>) -> Result<Self> {
        validate_rules(&rules)?;

        let mut rules = rules;
        rules.sort_by(|a, b| b.source.len().cmp(&a.source.len()));
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[PrefixRule] {
        &self.rules
    }

    /// Whether the path falls under one of the tracked prefixes
    pub fn is_tracked(&self, path: &str) -> bool {
        self.matching_rule(path).is_some()
    }

    /// Destination path for a tracked source path, `None` if untracked
    pub fn map_path(&self, path: &str) -> Option<String> {
        self.matching_rule(path)
            .map(|rule| format!("{}{}", rule.dest, &path[rule.source.len()..]))
    }

    /// Pair a source path with its destination if it is tracked
    pub fn track(&self, path: &str) -> Option<TrackedFile> {
        self.map_path(path).map(|dest| TrackedFile {
            source: path.to_string(),
            dest,
        })
    }

    fn matching_rule(&self, path: &str) -> Option<&PrefixRule> {
        // A path equal to the bare prefix is a directory, not a file
        self.rules
            .iter()
            .find(|rule| path.len() > rule.source.len() && path.starts_with(&rule.source))
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        let mut rules = default_prefix_rules();
        rules.sort_by(|a, b| b.source.len().cmp(&a.source.len()));
        Self { rules }
    }
}

fn validate_rules(rules: &[PrefixRule]) -> Result<()> {
    if rules.is_empty() {
        return Err(ReplicationError::Configuration(
            "at least one path prefix rule is required".to_string(),
        ));
    }

    for (i, rule) in rules.iter().enumerate() {
        if rule.source.is_empty() || !rule.source.ends_with('/') {
            return Err(ReplicationError::Configuration(format!(
                "source prefix '{}' must be non-empty and end with '/'",
                rule.source
            )));
        }
        if !rule.dest.is_empty() && !rule.dest.ends_with('/') {
            return Err(ReplicationError::Configuration(format!(
                "destination prefix '{}' must be empty or end with '/'",
                rule.dest
            )));
        }
        normalize_relative(&rule.source)?;
        if !rule.dest.is_empty() {
            normalize_relative(&rule.dest)?;
        }
        if rules[..i].iter().any(|other| other.source == rule.source) {
            return Err(ReplicationError::Configuration(format!(
                "source prefix '{}' is listed twice",
                rule.source
            )));
        }
    }

    Ok(())
}

/// Normalize a repository-relative path
///
/// - Rejects absolute paths and `..` components
/// - Removes `.` components
/// - Uses the platform separator in the returned path
pub fn normalize_relative(path: &str) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ReplicationError::Configuration(format!(
                    "path '{}' escapes the repository root",
                    path
                )))
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ReplicationError::Configuration(format!(
                    "path '{}' must be relative",
                    path
                )))
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ReplicationError::Configuration(format!(
            "path '{}' is empty",
            path
        )));
    }

    Ok(normalized)
}
