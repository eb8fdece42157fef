//! Locale registration tag handling
//!
//! The destination's index file carries a machine-maintained tag:
//!
//! ```html
//! <meta name="locales" content="en-US,fr,de" />
//! ```
//!
//! The tag is parsed structurally (attribute list with quoted values) rather
//! than pattern-matched. Exactly one `<meta>` element must carry the requested
//! name, and that element must be well formed with quoted values. Other
//! `<meta>` elements only need to be readable enough to be told apart;
//! comments and `<script>`/`<style>` bodies are not scanned.

use std::ops::Range;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocaleTagError {
    #[error("no <meta name=\"{0}\"> tag found")]
    Missing(String),

    #[error("more than one <meta name=\"{0}\"> tag found")]
    Duplicate(String),

    #[error("<meta name=\"{0}\"> tag has no content attribute")]
    NoContent(String),

    #[error("malformed <meta> tag at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    #[error("locale value contains the {0} quote used by the tag")]
    Unquotable(char),
}

/// One attribute of a `<meta>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Byte range of the value inside the document (without quotes)
    pub value_range: Range<usize>,
    /// Quote character around the value, `None` for bare or unquoted
    /// attributes
    pub quote: Option<char>,
}

impl Attribute {
    /// `name=value` without quotes
    pub fn is_unquoted(&self) -> bool {
        self.quote.is_none() && !self.value_range.is_empty()
    }
}

/// A parsed `<meta ...>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaTag {
    /// Byte range of the whole element
    pub span: Range<usize>,
    pub attributes: Vec<Attribute>,
}

impl MetaTag {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

/// A `<meta>` element that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenMeta {
    /// Value of `name`, when it was read before the failure
    pub name: Option<String>,
    pub error: LocaleTagError,
}

/// Parse every `<meta>` element of the document
///
/// HTML comments and raw-text `<script>`/`<style>` bodies are skipped.
pub fn meta_tags(html: &str) -> Vec<Result<MetaTag, BrokenMeta>> {
    let bytes = html.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"<!--") {
            i = match html[i + 4..].find("-->") {
                Some(end) => i + 4 + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        if let Some(end) = raw_text_end(html, i) {
            i = end;
            continue;
        }

        if is_element_open(bytes, i, b"meta") {
            match parse_meta(bytes, html, i) {
                Ok(tag) => {
                    i = tag.span.end;
                    tags.push(Ok(tag));
                }
                Err(broken) => {
                    i += 5;
                    tags.push(Err(broken));
                }
            }
            continue;
        }

        i += 1;
    }

    tags
}

/// Find the single `<meta name="{meta_name}">` element
///
/// Unparsable elements that do not carry the requested name are ignored.
pub fn find_meta(html: &str, meta_name: &str) -> Result<MetaTag, LocaleTagError> {
    let mut found: Option<MetaTag> = None;

    for scanned in meta_tags(html) {
        let tag = match scanned {
            Ok(tag) => tag,
            Err(broken) if broken.name.as_deref() == Some(meta_name) => return Err(broken.error),
            Err(broken) => {
                tracing::debug!(error = %broken.error, "Ignoring unrelated <meta> element");
                continue;
            }
        };

        let matches = tag
            .attribute("name")
            .map(|attr| attr.value == meta_name)
            .unwrap_or(false);
        if !matches {
            continue;
        }
        if let Some(attr) = tag.attributes.iter().find(|attr| attr.is_unquoted()) {
            return Err(LocaleTagError::Malformed {
                offset: attr.value_range.start,
                reason: "unquoted attribute value",
            });
        }
        if found.is_some() {
            return Err(LocaleTagError::Duplicate(meta_name.to_string()));
        }
        found = Some(tag);
    }

    found.ok_or_else(|| LocaleTagError::Missing(meta_name.to_string()))
}

/// Value of the tag's `content` attribute
pub fn read_content(html: &str, meta_name: &str) -> Result<String, LocaleTagError> {
    let tag = find_meta(html, meta_name)?;
    content_attribute(&tag, meta_name).map(|attr| attr.value.clone())
}

/// Replace only the value of the tag's `content` attribute
pub fn replace_content(
    html: &str,
    meta_name: &str,
    value: &str,
) -> Result<String, LocaleTagError> {
    let tag = find_meta(html, meta_name)?;
    let attr = content_attribute(&tag, meta_name)?;

    if let Some(quote) = attr.quote {
        if value.contains(quote) {
            return Err(LocaleTagError::Unquotable(quote));
        }
    }

    let mut out = String::with_capacity(html.len() + value.len());
    out.push_str(&html[..attr.value_range.start]);
    out.push_str(value);
    out.push_str(&html[attr.value_range.end..]);
    Ok(out)
}

/// Carry the locale list of `existing` over into `incoming`
pub fn preserve_content(
    existing: &str,
    incoming: &str,
    meta_name: &str,
) -> Result<String, LocaleTagError> {
    let locales = read_content(existing, meta_name)?;
    replace_content(incoming, meta_name, &locales)
}

fn content_attribute<'t>(tag: &'t MetaTag, meta_name: &str) -> Result<&'t Attribute, LocaleTagError> {
    match tag.attribute("content") {
        Some(attr) if attr.quote.is_some() => Ok(attr),
        _ => Err(LocaleTagError::NoContent(meta_name.to_string())),
    }
}

fn is_element_open(bytes: &[u8], i: usize, tag: &[u8]) -> bool {
    let after = i + 1 + tag.len();
    if bytes.len() <= after || bytes[i] != b'<' {
        return false;
    }
    if !bytes[i + 1..after].eq_ignore_ascii_case(tag) {
        return false;
    }
    matches!(bytes[after], b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>')
}

/// End of a `<script>` or `<style>` element starting at `i`
fn raw_text_end(html: &str, i: usize) -> Option<usize> {
    let bytes = html.as_bytes();
    let tag = [b"script".as_slice(), b"style".as_slice()]
        .into_iter()
        .find(|tag| is_element_open(bytes, i, tag))?;

    let closing = format!("</{}", String::from_utf8_lossy(tag));
    let body = html[i..].to_ascii_lowercase();
    Some(match body.find(&closing) {
        Some(pos) => i + pos + closing.len(),
        None => bytes.len(),
    })
}

fn parse_meta(bytes: &[u8], html: &str, start: usize) -> Result<MetaTag, BrokenMeta> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut i = start + 5;

    let malformed = |attributes: &[Attribute], offset: usize, reason: &'static str| BrokenMeta {
        name: attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case("name"))
            .map(|attr| attr.value.clone()),
        error: LocaleTagError::Malformed { offset, reason },
    };

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(malformed(&attributes, start, "unterminated tag"));
        }

        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                i += 2;
                break;
            }
            _ => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
        {
            i += 1;
        }
        if i == name_start {
            return Err(malformed(&attributes, i, "unexpected character in attribute list"));
        }
        let name = html[name_start..i].to_string();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            match bytes.get(i) {
                Some(&(quote @ (b'"' | b'\''))) => {
                    let value_start = i + 1;
                    let value_end = match bytes[value_start..].iter().position(|&b| b == quote) {
                        Some(len) => value_start + len,
                        None => {
                            return Err(malformed(&attributes, i, "unterminated attribute value"));
                        }
                    };
                    attributes.push(Attribute {
                        name,
                        value: html[value_start..value_end].to_string(),
                        value_range: value_start..value_end,
                        quote: Some(quote as char),
                    });
                    i = value_end + 1;
                }
                _ => {
                    // HTML5 unquoted value, runs to whitespace or `>`
                    let value_start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && !matches!(bytes[i], b'>' | b'"' | b'\'' | b'<' | b'=' | b'`')
                    {
                        i += 1;
                    }
                    if i == value_start {
                        return Err(malformed(&attributes, i, "missing attribute value"));
                    }
                    attributes.push(Attribute {
                        name,
                        value: html[value_start..i].to_string(),
                        value_range: value_start..i,
                        quote: None,
                    });
                }
            }
        } else {
            attributes.push(Attribute {
                name,
                value: String::new(),
                value_range: i..i,
                quote: None,
            });
        }
    }

    Ok(MetaTag {
        span: start..i,
        attributes,
    })
}
