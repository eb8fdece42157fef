//! Path-conditioned content rewrites applied before files reach the destination
//!
//! Rules match on the exact destination path and run in the configured
//! order. Files no rule matches pass through untouched.

use crate::error::{ReplicationError, Result};
use crate::locale;
use serde::{Deserialize, Serialize};

/// A single content rewrite rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformRule {
    /// Replace every occurrence of `from` with `to`
    ///
    /// Used for test entry pages whose relative resource references point
    /// into a directory the path remap removed.
    ReplaceText { path: String, from: String, to: String },

    /// Keep the destination's locale list in the index file
    PreserveLocales {
        path: String,
        #[serde(default = "default_meta_name")]
        meta_name: String,
    },

    /// Drop every line equal to `line` (compared with surrounding whitespace trimmed)
    StripLine { path: String, line: String },
}

fn default_meta_name() -> String {
    "locales".to_string()
}

impl TransformRule {
    /// Destination path this rule applies to
    pub fn path(&self) -> &str {
        match self {
            TransformRule::ReplaceText { path, .. }
            | TransformRule::PreserveLocales { path, .. }
            | TransformRule::StripLine { path, .. } => path,
        }
    }

    fn apply(&self, text: &str, existing: Option<&[u8]>) -> Result<String> {
        match self {
            TransformRule::ReplaceText { from, to, .. } => Ok(text.replace(from.as_str(), to)),
            TransformRule::PreserveLocales { path, meta_name } => {
                let existing = existing.ok_or_else(|| {
                    ReplicationError::transform(
                        path.as_str(),
                        "destination has no existing copy to take the locale list from",
                    )
                })?;
                let existing = std::str::from_utf8(existing).map_err(|_| {
                    ReplicationError::transform(path.as_str(), "existing destination copy is not UTF-8")
                })?;

                let value = locale::read_content(existing, meta_name).map_err(|e| {
                    ReplicationError::transform(path.as_str(), format!("existing copy: {}", e))
                })?;
                locale::replace_content(text, meta_name, &value).map_err(|e| {
                    ReplicationError::transform(path.as_str(), format!("incoming copy: {}", e))
                })
            }
            TransformRule::StripLine { line, .. } => Ok(strip_lines(text, line.trim())),
        }
    }
}

/// Default rules of the Loop standalone client layout
pub fn default_rules() -> Vec<TransformRule> {
    let rewrite = |path: &str| TransformRule::ReplaceText {
        path: path.to_string(),
        from: "src=\"../../standalone/".to_string(),
        to: "src=\"../../".to_string(),
    };

    vec![
        rewrite("test/standalone/index.html"),
        rewrite("test/shared/index.html"),
        TransformRule::PreserveLocales {
            path: "content/index.html".to_string(),
            meta_name: default_meta_name(),
        },
    ]
}

/// Ordered pipeline of content rules
#[derive(Debug, Clone, Default)]
pub struct ContentTransformer {
    rules: Vec<TransformRule>,
}

impl ContentTransformer {
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[TransformRule] {
        &self.rules
    }

    /// Whether any rule for this path needs the destination's current copy
    pub fn needs_existing(&self, dest_path: &str) -> bool {
        self.rules.iter().any(|rule| {
            matches!(rule, TransformRule::PreserveLocales { .. }) && rule.path() == dest_path
        })
    }

    /// Run every rule matching `dest_path` over `content`
    pub fn transform(
        &self,
        dest_path: &str,
        content: Vec<u8>,
        existing: Option<&[u8]>,
    ) -> Result<Vec<u8>> {
        let mut matching = self.rules.iter().filter(|rule| rule.path() == dest_path).peekable();
        if matching.peek().is_none() {
            return Ok(content);
        }

        let mut text = String::from_utf8(content)
            .map_err(|_| ReplicationError::transform(dest_path, "content is not UTF-8"))?;

        for rule in matching {
            tracing::debug!(path = dest_path, rule = ?rule, "Applying content rule");
            text = rule.apply(&text, existing)?;
        }

        Ok(text.into_bytes())
    }
}

fn strip_lines(text: &str, entry: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| line.trim() != entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> ContentTransformer {
        let mut rules = default_rules();
        rules.push(TransformRule::StripLine {
            path: "package.json".to_string(),
            line: "\"mozilla-only-dep\": \"^1.0.0\",".to_string(),
        });
        ContentTransformer::new(rules)
    }

    #[test]
    fn test_unmatched_path_passes_through() {
        let t = transformer();
        let bytes = vec![0xff, 0xfe, 0x00];
        assert_eq!(t.transform("content/js/app.js", bytes.clone(), None).unwrap(), bytes);
    }

    #[test]
    fn test_reference_rewrite() {
        let t = transformer();
        let input = b"<script src=\"../../standalone/content/js/webapp.js\"></script>\n\
<script src=\"../../content/shared/js/utils.js\"></script>\n"
            .to_vec();
        let out = t.transform("test/standalone/index.html", input, None).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<script src=\"../../content/js/webapp.js\"></script>\n\
<script src=\"../../content/shared/js/utils.js\"></script>\n"
        );
    }

    #[test]
    fn test_locale_preservation() {
        let t = transformer();
        let existing = br#"<meta name="locales" content="en,fr" />"#;
        let incoming = b"<p>new</p>\n<meta name=\"locales\" content=\"de\" />\n".to_vec();

        let out = t
            .transform("content/index.html", incoming, Some(existing))
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<p>new</p>\n<meta name=\"locales\" content=\"en,fr\" />\n"
        );
    }

    #[test]
    fn test_locale_preservation_on_full_page() {
        let t = ContentTransformer::new(default_rules());
        let existing = b"<!DOCTYPE html>\n<head><meta charset=utf-8>\n\
<meta name=\"locales\" content=\"en,fr\" /></head>\n";
        let incoming = b"<!DOCTYPE html>\n<head><meta charset=utf-8>\n\
<meta name=\"locales\" content=\"de\" /></head>\n\
<script>var s = '<meta ' + x;</script>\n"
            .to_vec();

        let out = t
            .transform("content/index.html", incoming, Some(existing))
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<!DOCTYPE html>\n<head><meta charset=utf-8>\n\
<meta name=\"locales\" content=\"en,fr\" /></head>\n\
<script>var s = '<meta ' + x;</script>\n"
        );
    }

    #[test]
    fn test_locale_preservation_requires_existing_tag() {
        let t = transformer();
        let incoming = b"<meta name=\"locales\" content=\"de\" />".to_vec();

        let err = t.transform("content/index.html", incoming.clone(), None).unwrap_err();
        assert!(matches!(err, ReplicationError::TransformPrecondition { .. }));

        let err = t
            .transform("content/index.html", incoming, Some(b"<html></html>"))
            .unwrap_err();
        assert!(err.to_string().contains("existing copy"));
    }

    #[test]
    fn test_locale_preservation_requires_incoming_tag() {
        let t = transformer();
        let existing = br#"<meta name="locales" content="en" />"#;
        let err = t
            .transform("content/index.html", b"<html></html>".to_vec(), Some(existing))
            .unwrap_err();
        assert!(err.to_string().contains("incoming copy"));
    }

    #[test]
    fn test_strip_line() {
        let t = transformer();
        let input = b"{\n  \"dependencies\": {\n    \"mozilla-only-dep\": \"^1.0.0\",\n    \"react\": \"0.13.3\"\n  }\n}\n".to_vec();
        let out = t.transform("package.json", input, None).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\n  \"dependencies\": {\n    \"react\": \"0.13.3\"\n  }\n}\n"
        );
    }

    #[test]
    fn test_text_rule_rejects_binary() {
        let t = transformer();
        let err = t.transform("package.json", vec![0xff, 0xfe], None).unwrap_err();
        assert!(matches!(err, ReplicationError::TransformPrecondition { .. }));
    }

    #[test]
    fn test_needs_existing() {
        let t = transformer();
        assert!(t.needs_existing("content/index.html"));
        assert!(!t.needs_existing("test/shared/index.html"));
        assert!(!t.needs_existing("package.json"));
    }

    #[test]
    fn test_rules_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            transforms: Vec<TransformRule>,
        }

        let doc: Doc = toml::from_str(
            r#"
            [[transforms]]
            kind = "replace_text"
            path = "test/shared/index.html"
            from = "a"
            to = "b"

            [[transforms]]
            kind = "preserve_locales"
            path = "content/index.html"

            [[transforms]]
            kind = "strip_line"
            path = "package.json"
            line = "x"
            "#,
        )
        .unwrap();

        assert_eq!(doc.transforms.len(), 3);
        assert_eq!(
            doc.transforms[1],
            TransformRule::PreserveLocales {
                path: "content/index.html".to_string(),
                meta_name: "locales".to_string(),
            }
        );
    }
}
