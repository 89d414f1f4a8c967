//! Asset references and their classification.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{AppPath, PathError, is_url};

/// How a reference is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Another asset in the same bundle (drives asset ordering).
    SameBundle,
    /// An asset or directory owned by some other bundle.
    DifferentBundle,
    /// An absolute URL, served by a synthesized external bundle.
    Url,
    /// A file that is not an asset (images, fonts), tracked for staleness.
    RawFile,
}

/// Classified reference target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "kebab-case")]
pub enum ReferenceTarget {
    SameBundle(AppPath),
    DifferentBundle(AppPath),
    Url(String),
    RawFile(AppPath),
}

impl ReferenceTarget {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Self::SameBundle(_) => ReferenceKind::SameBundle,
            Self::DifferentBundle(_) => ReferenceKind::DifferentBundle,
            Self::Url(_) => ReferenceKind::Url,
            Self::RawFile(_) => ReferenceKind::RawFile,
        }
    }

    /// Application path of the target (None for URLs).
    pub fn path(&self) -> Option<&AppPath> {
        match self {
            Self::SameBundle(path) | Self::DifferentBundle(path) | Self::RawFile(path) => {
                Some(path)
            }
            Self::Url(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::SameBundle(path) | Self::DifferentBundle(path) | Self::RawFile(path) => {
                path.as_str()
            }
        }
    }
}

/// A reference declared by an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReference {
    /// Asset declaring the reference.
    pub source: AppPath,
    pub target: ReferenceTarget,
    /// 1-based line of the declaration, if known.
    pub source_line: Option<u32>,
}

impl AssetReference {
    pub fn new(source: AppPath, target: ReferenceTarget, source_line: Option<u32>) -> Self {
        Self {
            source,
            target,
            source_line,
        }
    }

    #[inline]
    pub fn kind(&self) -> ReferenceKind {
        self.target.kind()
    }
}

/// What a bundle looks like from the point of view of its own assets.
pub struct BundleScope<'a> {
    pub path: &'a AppPath,
    pub members: &'a FxHashSet<AppPath>,
}

impl BundleScope<'_> {
    fn owns(&self, path: &AppPath) -> bool {
        path.is_within(self.path) || path == self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Path(#[from] PathError),

    /// Target lies inside the bundle's directory but is not one of its assets.
    #[error("cannot find \"{0}\"")]
    Missing(AppPath),
}

/// Classify a raw asset reference found in `source`.
///
/// - Absolute URLs become `Url`
/// - Paths inside the bundle's directory must name one of its assets
/// - Anything else belongs to a different bundle
pub fn classify_reference(
    raw: &str,
    source: &AppPath,
    scope: &BundleScope<'_>,
) -> Result<ReferenceTarget, ClassifyError> {
    let raw = raw.trim();
    if is_url(raw) {
        return Ok(ReferenceTarget::Url(raw.to_string()));
    }

    let target = AppPath::combine(source, raw)?;
    if scope.owns(&target) {
        if scope.members.contains(&target) {
            Ok(ReferenceTarget::SameBundle(target))
        } else {
            Err(ClassifyError::Missing(target))
        }
    } else {
        Ok(ReferenceTarget::DifferentBundle(target))
    }
}

/// Resolve a raw (non-asset) file reference, dropping any query or fragment.
pub fn classify_raw_file(raw: &str, source: &AppPath) -> Result<ReferenceTarget, PathError> {
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    AppPath::combine(source, &raw[..end]).map(ReferenceTarget::RawFile)
}
