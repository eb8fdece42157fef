//! Source changeset data structures

use crate::error::{ReplicationError, Result};
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content-addressed identifier of a source changeset (hex node hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangesetId(String);

impl ChangesetId {
    /// Parse an identifier, rejecting empty and non-hex input
    ///
    /// Surrounding whitespace is ignored and the result is lowercased, so a
    /// checkpoint record written with a trailing newline parses cleanly.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ReplicationError::Configuration(
                "changeset identifier is empty".to_string(),
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ReplicationError::Configuration(format!(
                "'{}' is not a hex changeset identifier",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Wrap a string already known to be lowercase hex
    pub(crate) fn from_trusted(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, the usual short form
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }

    /// Mercurial's null node (all zeroes), used for absent parents
    pub fn is_null(&self) -> bool {
        self.0.chars().all(|c| c == '0')
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Commit time as recorded by the source
///
/// `offset_west_secs` follows Mercurial's convention: seconds *west* of UTC,
/// so UTC+02:00 is stored as -7200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub unix_secs: i64,
    pub offset_west_secs: i32,
}

impl Timestamp {
    pub fn new(unix_secs: i64, offset_west_secs: i32) -> Self {
        Self {
            unix_secs,
            offset_west_secs,
        }
    }

    /// Convert to a fixed-offset datetime in the changeset's own zone
    pub fn to_fixed(&self) -> Result<DateTime<FixedOffset>> {
        let offset = FixedOffset::west_opt(self.offset_west_secs).ok_or_else(|| {
            ReplicationError::CommitMetadata(format!(
                "UTC offset {}s is out of range",
                self.offset_west_secs
            ))
        })?;

        offset
            .timestamp_opt(self.unix_secs, 0)
            .single()
            .ok_or_else(|| {
                ReplicationError::CommitMetadata(format!(
                    "timestamp {} is out of range",
                    self.unix_secs
                ))
            })
    }
}

/// One immutable unit of source history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Node hash
    pub id: ChangesetId,
    /// Position in the source's native ordering
    pub seq: u64,
    /// Parent identifiers, null parents excluded
    pub parents: Vec<ChangesetId>,
    /// Raw author string, usually `Name <email>`
    pub author: String,
    pub timestamp: Timestamp,
    pub description: String,
    /// Paths touched by this changeset
    pub files: Vec<String>,
}

impl Changeset {
    /// Merges have more than one parent and are never replicated
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// First line of the description
    pub fn summary(&self) -> &str {
        self.description.lines().next().unwrap_or("")
    }
}

/// A source path accepted by the filter, paired with its destination path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackedFile {
    pub source: String,
    pub dest: String,
}

/// What a tracked file turns into at a given changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Write(Vec<u8>),
    Delete,
}

impl From<Option<Vec<u8>>> for FileAction {
    fn from(content: Option<Vec<u8>>) -> Self {
        match content {
            Some(bytes) => FileAction::Write(bytes),
            None => FileAction::Delete,
        }
    }
}

/// Format a source author as a Git identity (`Name <email>`)
///
/// Authors without an address get an empty one (`Name <>`), which Git
/// accepts; blank names and embedded newlines are rejected.
pub fn git_identity(author: &str) -> Result<String> {
    let author = author.trim();
    if author.is_empty() {
        return Err(ReplicationError::CommitMetadata("author is empty".to_string()));
    }
    if author.contains('\n') || author.contains('\r') {
        return Err(ReplicationError::CommitMetadata(format!(
            "author '{}' spans multiple lines",
            author.escape_debug()
        )));
    }

    match (author.find('<'), author.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = author[..open].trim();
            let email = author[open + 1..close].trim();
            let name = if name.is_empty() { email } else { name };
            if name.is_empty() {
                return Err(ReplicationError::CommitMetadata(format!(
                    "author '{}' has no name",
                    author
                )));
            }
            Ok(format!("{} <{}>", name, email))
        }
        (None, None) => Ok(format!("{} <>", author)),
        _ => Err(ReplicationError::CommitMetadata(format!(
            "author '{}' has unbalanced angle brackets",
            author
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changeset_id_parse() {
        let id = ChangesetId::parse("  ABCDEF0123456789abcdef0123456789abcdef01\n").unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(id.short(), "abcdef012345");

        assert!(ChangesetId::parse("").is_err());
        assert!(ChangesetId::parse("   \n").is_err());
        assert!(ChangesetId::parse("not-a-hash").is_err());
    }

    #[test]
    fn test_null_id() {
        assert!(ChangesetId::parse(&"0".repeat(40)).unwrap().is_null());
        assert!(!ChangesetId::parse("0001").unwrap().is_null());
    }

    #[test]
    fn test_timestamp_uses_recorded_offset() {
        // 2015-07-07 12:00:00 UTC, recorded in UTC+02:00
        let ts = Timestamp::new(1_436_270_400, -7200);
        let fixed = ts.to_fixed().unwrap();
        assert_eq!(fixed.to_rfc3339(), "2015-07-07T14:00:00+02:00");
        assert_eq!(fixed.timestamp(), 1_436_270_400);

        // West of UTC
        let ts = Timestamp::new(1_436_270_400, 25200);
        assert_eq!(ts.to_fixed().unwrap().to_rfc3339(), "2015-07-07T05:00:00-07:00");
    }

    #[test]
    fn test_timestamp_rejects_bad_offset() {
        let ts = Timestamp::new(0, 90_000);
        assert!(matches!(ts.to_fixed(), Err(ReplicationError::CommitMetadata(_))));
    }

    #[test]
    fn test_git_identity() {
        assert_eq!(
            git_identity("Jane Doe <jane@example.com>").unwrap(),
            "Jane Doe <jane@example.com>"
        );
        assert_eq!(git_identity("jdoe").unwrap(), "jdoe <>");
        assert_eq!(
            git_identity("<jane@example.com>").unwrap(),
            "jane@example.com <jane@example.com>"
        );
        assert!(git_identity("  ").is_err());
        assert!(git_identity("Jane <jane@example.com").is_err());
        assert!(git_identity("Jane\nDoe").is_err());
    }

    #[test]
    fn test_merge_detection() {
        let parent = |n: u8| ChangesetId::parse(&format!("{:040x}", n)).unwrap();
        let mut cs = Changeset {
            id: parent(9),
            seq: 9,
            parents: vec![parent(8)],
            author: "a".into(),
            timestamp: Timestamp::new(0, 0),
            description: "Bug 1 - thing\n\nmore".into(),
            files: vec![],
        };
        assert!(!cs.is_merge());
        assert_eq!(cs.summary(), "Bug 1 - thing");

        cs.parents.push(parent(7));
        assert!(cs.is_merge());
    }
}
