//! Bundle kinds.

use serde::{Deserialize, Serialize};

use crate::asset::parse::{self, RawReference};
use crate::core::AppPath;

/// What a bundle contains, and therefore how it is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleKind {
    Script,
    Stylesheet,
    HtmlTemplate,
}

impl BundleKind {
    /// Source file extensions picked up by the default search.
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Script => &["js"],
            Self::Stylesheet => &["css"],
            Self::HtmlTemplate => &["htm", "html"],
        }
    }

    /// Extension of the bundled output.
    pub const fn output_extension(self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Stylesheet => "css",
            Self::HtmlTemplate => "html",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
            Self::HtmlTemplate => "html-template",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        [Self::Script, Self::Stylesheet, Self::HtmlTemplate]
            .into_iter()
            .find(|kind| kind.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    pub fn from_path(path: &AppPath) -> Option<Self> {
        path.extension().as_deref().and_then(Self::from_extension)
    }

    /// Check whether the default search includes `path`.
    pub fn accepts(self, path: &AppPath) -> bool {
        Self::from_path(path) == Some(self)
    }
}

/// Scan references using the syntax of the file's own type.
pub fn scan_references(path: &AppPath, source: &str) -> Vec<RawReference> {
    match BundleKind::from_path(path) {
        Some(BundleKind::Script) => parse::scan_script(source),
        Some(BundleKind::Stylesheet) => parse::scan_stylesheet(source),
        Some(BundleKind::HtmlTemplate) => parse::scan_html_template(source),
        None => Vec::new(),
    }
}

impl std::fmt::Display for BundleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(BundleKind::from_extension("JS"), Some(BundleKind::Script));
        assert_eq!(BundleKind::from_extension("htm"), Some(BundleKind::HtmlTemplate));
        assert_eq!(BundleKind::from_extension("txt"), None);
    }

    #[test]
    fn test_accepts() {
        let css = AppPath::normalize("~/styles/Site.CSS").unwrap();
        assert!(BundleKind::Stylesheet.accepts(&css));
        assert!(!BundleKind::Script.accepts(&css));
    }

    #[test]
    fn test_serde_names() {
        let kind: BundleKind = serde_json::from_str("\"html-template\"").unwrap();
        assert_eq!(kind, BundleKind::HtmlTemplate);
    }
}
