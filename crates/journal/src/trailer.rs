//! Source-id trailer on replicated commit messages

use ferry_core::ChangesetId;
use std::collections::HashSet;

/// The `"{key}: {node}"` line that ties a destination commit to its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    key: String,
}

impl Trailer {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Commit message for a replicated changeset
    pub fn message(&self, description: &str, id: &ChangesetId) -> String {
        format!("{}\n{}: {}", description, self.key, id)
    }

    /// Source id recorded in a commit message, if any
    ///
    /// The last matching line wins, so a description that happens to quote
    /// another trailer does not shadow the real one.
    pub fn parse(&self, message: &str) -> Option<ChangesetId> {
        message
            .lines()
            .rev()
            .filter_map(|line| line.strip_prefix(self.key.as_str()))
            .filter_map(|rest| rest.strip_prefix(':'))
            .find_map(|value| ChangesetId::parse(value).ok())
    }

    /// Source ids of every message carrying a trailer
    pub fn collect<'m, I>(&self, messages: I) -> HashSet<ChangesetId>
    where
        I: IntoIterator<Item = &'m String>,
    {
        messages
            .into_iter()
            .filter_map(|message| self.parse(message))
            .collect()
    }
}
