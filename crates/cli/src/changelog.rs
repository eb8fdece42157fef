//! Changelog entries from replicated commit subjects

/// Review and landing annotations dropped from subjects
const ANNOTATION_PREFIXES: &[&str] = &["r=", "r?", "a=", "sr=", "f="];
const ANNOTATION_WORDS: &[&str] = &["DONTBUILD"];

fn is_annotation(token: &str) -> bool {
    let bare = token.trim_matches(|c| matches!(c, '(' | ')' | '[' | ']' | ',' | ';'));
    ANNOTATION_WORDS.contains(&bare)
        || ANNOTATION_PREFIXES
            .iter()
            .any(|prefix| bare.starts_with(prefix))
}

/// Rewrite `bug 123: text`, `Bug 123 text` and friends as `Bug 123 - text`
fn normalize_bug_prefix(subject: &str) -> String {
    let Some(rest) = subject
        .strip_prefix("Bug ")
        .or_else(|| subject.strip_prefix("bug "))
    else {
        return subject.to_string();
    };

    let digits = rest.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return subject.to_string();
    }

    let (number, tail) = rest.split_at(digits);
    let tail = tail.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ',' | '.'));
    if tail.is_empty() {
        format!("Bug {}", number)
    } else {
        format!("Bug {} - {}", number, tail)
    }
}

/// One changelog line for a commit subject, `None` if nothing is left
pub fn clean_subject(subject: &str) -> Option<String> {
    let kept: Vec<&str> = subject
        .split_whitespace()
        .filter(|token| !is_annotation(token))
        .collect();
    let joined = kept.join(" ");
    let trimmed = joined.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';'));

    if trimmed.is_empty() {
        None
    } else {
        Some(normalize_bug_prefix(trimmed))
    }
}

/// Changelog lines for commit subjects (newest first), checkpoint commits
/// excluded
pub fn entries(subjects: &[String], checkpoint_message: &str) -> Vec<String> {
    subjects
        .iter()
        .filter(|subject| subject.trim() != checkpoint_message)
        .filter_map(|subject| clean_subject(subject))
        .collect()
}

/// Place new entries above the existing log text
pub fn prepend(existing: &str, entries: &[String]) -> String {
    let mut out = String::with_capacity(existing.len() + entries.len() * 64);
    for entry in entries {
        out.push_str("- ");
        out.push_str(entry);
        out.push('\n');
    }
    out.push_str(existing);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_are_stripped() {
        assert_eq!(
            clean_subject("Bug 1180179 - Fix the room list. r=Standard8").as_deref(),
            Some("Bug 1180179 - Fix the room list.")
        );
        assert_eq!(
            clean_subject("Bug 42 - Tweak css, r=mikedeboer a=lizzard DONTBUILD").as_deref(),
            Some("Bug 42 - Tweak css")
        );
        assert_eq!(
            clean_subject("Bug 7 - Thing (r?dmose) sr=someone f=other").as_deref(),
            Some("Bug 7 - Thing")
        );
        assert_eq!(clean_subject("r=foo DONTBUILD"), None);
    }

    #[test]
    fn test_bug_separator_is_normalized() {
        assert_eq!(clean_subject("bug 123: fix").as_deref(), Some("Bug 123 - fix"));
        assert_eq!(clean_subject("Bug 123 fix").as_deref(), Some("Bug 123 - fix"));
        assert_eq!(clean_subject("Bug 123 -- fix").as_deref(), Some("Bug 123 - fix"));
        assert_eq!(clean_subject("Bug 123").as_deref(), Some("Bug 123"));
        assert_eq!(clean_subject("Bugfix for thing").as_deref(), Some("Bugfix for thing"));
        assert_eq!(
            clean_subject("Backed out changeset abc").as_deref(),
            Some("Backed out changeset abc")
        );
    }

    #[test]
    fn test_entries_skip_checkpoint_commits() {
        let subjects = vec![
            "update latest merged cset file".to_string(),
            "Bug 2 - second r=a".to_string(),
            "Bug 1 - first".to_string(),
        ];
        assert_eq!(
            entries(&subjects, "update latest merged cset file"),
            vec!["Bug 2 - second", "Bug 1 - first"]
        );
    }

    #[test]
    fn test_prepend() {
        let existing = "- Bug 1 - old\n";
        let out = prepend(existing, &["Bug 3 - new".to_string(), "Bug 2 - mid".to_string()]);
        assert_eq!(out, "- Bug 3 - new\n- Bug 2 - mid\n- Bug 1 - old\n");
        assert_eq!(prepend("", &[]), "");
    }
}
