//! Reference scanners.
//!
//! Each scanner extracts raw reference strings with their 1-based line
//! numbers. Resolution against the bundle happens elsewhere.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::is_url;

/// A raw reference as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReference {
    pub target: String,
    pub line: u32,
}

impl RawReference {
    fn new(target: &str, line: usize) -> Self {
        Self {
            target: target.trim().to_string(),
            line: line as u32,
        }
    }
}

/// `/// <reference path="..." />`
static SCRIPT_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*///\s*<reference\s+path\s*=\s*["']([^"']+)["']"#).unwrap()
});

/// `@reference "...";` (inside a CSS comment)
static STYLESHEET_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@reference\s+(?:"([^"]+)"|'([^']+)'|([^\s;"']+))\s*;?"#).unwrap()
});

/// `<!-- @reference "..." -->`
static TEMPLATE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<!--\s*@reference\s+(?:"([^"]+)"|'([^']+)'|([^\s"']+))\s*-->"#).unwrap()
});

/// `url(...)` with optional quotes.
pub(crate) static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\burl\(\s*(["']?)([^"')]+)(["']?)\s*\)"#).unwrap()
});

/// Script references, one per line at most.
pub fn scan_script(source: &str) -> Vec<RawReference> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let caps = SCRIPT_REFERENCE.captures(line)?;
            Some(RawReference::new(&caps[1], index + 1))
        })
        .collect()
}

/// Stylesheet `@reference` declarations inside `/* */` comments.
pub fn scan_stylesheet(source: &str) -> Vec<RawReference> {
    css_comments(source)
        .into_iter()
        .flat_map(|(line, text)| {
            STYLESHEET_REFERENCE
                .captures_iter(text)
                .filter_map(|caps| first_group(&caps).map(|t| RawReference::new(t, line)))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// HTML template `<!-- @reference -->` comments.
pub fn scan_html_template(source: &str) -> Vec<RawReference> {
    source
        .lines()
        .enumerate()
        .flat_map(|(index, line)| {
            TEMPLATE_REFERENCE
                .captures_iter(line)
                .filter_map(|caps| first_group(&caps).map(|t| RawReference::new(t, index + 1)))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Relative `url(...)` targets in a stylesheet (outside comments too).
///
/// Absolute URLs, `data:` URIs and fragment-only references are skipped.
pub fn scan_css_urls(source: &str) -> Vec<RawReference> {
    source
        .lines()
        .enumerate()
        .flat_map(|(index, line)| {
            CSS_URL
                .captures_iter(line)
                .filter(|caps| is_relative_url(&caps[2]))
                .map(|caps| RawReference::new(&caps[2], index + 1))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// True for `url()` targets that point into the application.
pub(crate) fn is_relative_url(target: &str) -> bool {
    let target = target.trim();
    !(target.is_empty()
        || is_url(target)
        || target.starts_with('#')
        || target.get(..5).is_some_and(|s| s.eq_ignore_ascii_case("data:")))
}

/// Comment bodies of a stylesheet, split per line: `(line, text)`.
fn css_comments(source: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut in_comment = false;

    for (index, line) in source.lines().enumerate() {
        let number = index + 1;
        let mut rest = line;
        loop {
            if in_comment {
                match rest.find("*/") {
                    Some(end) => {
                        out.push((number, &rest[..end]));
                        rest = &rest[end + 2..];
                        in_comment = false;
                    }
                    None => {
                        out.push((number, rest));
                        break;
                    }
                }
            } else {
                match rest.find("/*") {
                    Some(start) => {
                        rest = &rest[start + 2..];
                        in_comment = true;
                    }
                    None => break,
                }
            }
        }
    }

    out
}

fn first_group<'t>(caps: &regex::Captures<'t>) -> Option<&'t str> {
    (1..caps.len()).find_map(|i| caps.get(i)).map(|m| m.as_str())
}
