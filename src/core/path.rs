//! Application-relative paths.
//!
//! Every asset and bundle is addressed by a `~/`-rooted path:
//! - Separators are always `/` (backslashes are converted)
//! - `.` and `..` segments are collapsed, never escaping the root
//! - Equality, hashing and ordering ignore ASCII case
//!
//! External bundles synthesized from URL references reuse the same type
//! through [`AppPath::external`], keeping the URL verbatim.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix of every application-relative path.
pub const ROOT: &str = "~/";

/// Malformed path errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path `~` does not name a file or directory")]
    BareRoot,

    #[error("path `{0}` escapes the application root")]
    EscapesRoot(String),

    #[error("path `{0}` is malformed: `~` must be followed by a separator")]
    Malformed(String),
}

/// Normalized application-relative path (or external URL address).
///
/// Invariants:
/// - Starts with `~/` unless created by [`AppPath::external`]
/// - No `.`/`..` segments, no empty segments, no trailing slash (except root)
#[derive(Clone)]
pub struct AppPath {
    path: Arc<str>,
    key: Arc<str>,
}

impl AppPath {
    /// The application root, `~/`.
    pub fn root() -> Self {
        Self::from_normalized(ROOT.to_string())
    }

    /// Normalize a raw path into `~/`-rooted form.
    ///
    /// Accepts `~/a/b`, `/a/b` and `a/b` (all rooted at the application root).
    pub fn normalize(raw: &str) -> Result<Self, PathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let unified = trimmed.replace('\\', "/");
        let rest = match unified.strip_prefix('~') {
            Some("") => return Err(PathError::BareRoot),
            Some(rest) if !rest.starts_with('/') => {
                return Err(PathError::Malformed(raw.to_string()));
            }
            Some(rest) => rest,
            None => unified.as_str(),
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in rest.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::EscapesRoot(raw.to_string()));
                    }
                }
                other => segments.push(other),
            }
        }

        Ok(Self::from_normalized(format!("{ROOT}{}", segments.join("/"))))
    }

    /// Resolve `relative` against the directory containing `base`.
    ///
    /// `~/x` and `/x` forms ignore `base` entirely.
    pub fn combine(base: &AppPath, relative: &str) -> Result<Self, PathError> {
        base.parent().join(relative)
    }

    /// Resolve `relative` treating `self` as a directory.
    pub fn join(&self, relative: &str) -> Result<Self, PathError> {
        let trimmed = relative.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        if trimmed.starts_with(['~', '/', '\\']) {
            return Self::normalize(trimmed);
        }
        Self::normalize(&format!("{}/{}", self.path, trimmed))
    }

    /// Address for a bundle synthesized from an external URL.
    pub fn external(url: &str) -> Self {
        Self::from_normalized(url.trim().to_string())
    }

    fn from_normalized(path: String) -> Self {
        let key = path.to_ascii_lowercase();
        Self {
            path: Arc::from(path),
            key: Arc::from(key),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Lowercase comparison key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path without the `~/` prefix.
    #[inline]
    pub fn relative(&self) -> &str {
        self.path.strip_prefix(ROOT).unwrap_or(&self.path)
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.path.as_ref() == ROOT
    }

    /// True for addresses created by [`AppPath::external`].
    #[inline]
    pub fn is_external(&self) -> bool {
        !self.path.starts_with(ROOT)
    }

    /// Containing directory (`~/a/b.js` -> `~/a`, `~/a` -> `~/`).
    pub fn parent(&self) -> AppPath {
        match self.relative().rfind('/') {
            Some(pos) => Self::from_normalized(format!("{ROOT}{}", &self.relative()[..pos])),
            None => Self::root(),
        }
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        let relative = self.relative();
        relative.rsplit('/').next().unwrap_or(relative)
    }

    /// Lowercase extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(name[pos + 1..].to_ascii_lowercase()),
        }
    }

    /// Check whether `self` lies strictly inside directory `dir`.
    pub fn is_within(&self, dir: &AppPath) -> bool {
        if self.is_external() || dir.is_external() {
            return false;
        }
        if dir.is_root() {
            return !self.is_root();
        }
        self.key
            .strip_prefix(dir.key())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Path of `self` relative to directory `dir`, if inside it.
    pub fn strip_dir(&self, dir: &AppPath) -> Option<&str> {
        if !self.is_within(dir) {
            return None;
        }
        let skip = if dir.is_root() { ROOT.len() } else { dir.as_str().len() + 1 };
        self.path.get(skip..)
    }
}

/// Check if a reference is an absolute URL (`http:`, `https:` or protocol-relative `//`).
pub fn is_url(s: &str) -> bool {
    let s = s.trim_start();
    let has_prefix = |prefix: &str| {
        s.get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
    };
    has_prefix("http:") || has_prefix("https:") || s.starts_with("//")
}

impl PartialEq for AppPath {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for AppPath {}

impl Hash for AppPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for AppPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AppPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for AppPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.path)
    }
}

impl fmt::Display for AppPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for AppPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if is_url(s) {
            Ok(Self::external(s))
        } else {
            Self::normalize(s)
        }
    }
}

impl Serialize for AppPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for AppPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> AppPath {
        AppPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_normalize_forms() {
        assert_eq!(p("~/scripts/app.js").as_str(), "~/scripts/app.js");
        assert_eq!(p("/scripts/app.js").as_str(), "~/scripts/app.js");
        assert_eq!(p("scripts/app.js").as_str(), "~/scripts/app.js");
        assert_eq!(p("~\\scripts\\lib\\..\\app.js").as_str(), "~/scripts/app.js");
        assert_eq!(p("~/scripts//./app/").as_str(), "~/scripts/app");
        assert_eq!(p("~/").as_str(), "~/");
    }

    #[test]
    fn test_normalize_errors() {
        assert_eq!(AppPath::normalize(""), Err(PathError::Empty));
        assert_eq!(AppPath::normalize("   "), Err(PathError::Empty));
        assert_eq!(AppPath::normalize("~"), Err(PathError::BareRoot));
        assert!(matches!(
            AppPath::normalize("~/a/../../b.js"),
            Err(PathError::EscapesRoot(_))
        ));
        assert!(matches!(
            AppPath::normalize("../b.js"),
            Err(PathError::EscapesRoot(_))
        ));
        assert_eq!(
            AppPath::normalize("~foo"),
            Err(PathError::Malformed("~foo".to_string()))
        );
        assert!(matches!(
            p("~/scripts").join("~lib/a.js"),
            Err(PathError::Malformed(_))
        ));
        assert_eq!(p("~\\foo").as_str(), "~/foo");
    }

    #[test]
    fn test_case_and_separator_insensitive_equality() {
        assert_eq!(p("~/Scripts/A.JS"), p("~\\scripts\\a.js"));
        assert_ne!(p("~/scripts/a.js"), p("~/scripts/b.js"));

        let mut set = rustc_hash::FxHashSet::default();
        set.insert(p("~/Scripts/App.js"));
        assert!(set.contains(&p("~/scripts/app.JS")));
    }

    #[test]
    fn test_combine() {
        let base = p("~/scripts/app/main.js");
        assert_eq!(
            AppPath::combine(&base, "util.js").unwrap().as_str(),
            "~/scripts/app/util.js"
        );
        assert_eq!(
            AppPath::combine(&base, "../lib/jquery.js").unwrap().as_str(),
            "~/scripts/lib/jquery.js"
        );
        assert_eq!(
            AppPath::combine(&base, "~/shared/x.js").unwrap().as_str(),
            "~/shared/x.js"
        );
        assert_eq!(
            AppPath::combine(&base, "/shared/x.js").unwrap().as_str(),
            "~/shared/x.js"
        );
        assert!(AppPath::combine(&base, "../../../x.js").is_err());
    }

    #[test]
    fn test_parent_and_names() {
        let path = p("~/styles/site.Main.CSS");
        assert_eq!(path.parent().as_str(), "~/styles");
        assert_eq!(path.parent().parent().as_str(), "~/");
        assert_eq!(path.file_name(), "site.Main.CSS");
        assert_eq!(path.extension().as_deref(), Some("css"));
        assert_eq!(p("~/styles/.hidden").extension(), None);
    }

    #[test]
    fn test_is_within() {
        let dir = p("~/scripts/app");
        assert!(p("~/Scripts/App/a.js").is_within(&dir));
        assert!(!p("~/scripts/app").is_within(&dir));
        assert!(!p("~/scripts/application.js").is_within(&dir));
        assert!(p("~/x.js").is_within(&AppPath::root()));
        assert_eq!(p("~/scripts/app/sub/a.js").strip_dir(&dir), Some("sub/a.js"));
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("http://example.com/a.js"));
        assert!(is_url("HTTPS://example.com/a.js"));
        assert!(is_url("//cdn.example.com/a.js"));
        assert!(!is_url("~/scripts/a.js"));
        assert!(!is_url("/scripts/a.js"));
        assert!(!is_url("data:image/png;base64,xx"));
    }

    #[test]
    fn test_external_addresses() {
        let url = AppPath::external("https://cdn.example.com/jQuery.js");
        assert!(url.is_external());
        assert_eq!(url, AppPath::external("https://CDN.example.com/jquery.js"));
        assert_eq!(url.as_str(), "https://cdn.example.com/jQuery.js");
        assert!(!p("~/cdn.example.com/x.js").is_within(&url));
    }

    #[test]
    fn test_serde_roundtrip_normalizes() {
        let parsed: AppPath = serde_json::from_str("\"scripts\\\\a.js\"").unwrap();
        assert_eq!(parsed.as_str(), "~/scripts/a.js");
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"~/scripts/a.js\"");
    }
}
