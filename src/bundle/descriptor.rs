//! Bundle descriptor files (`bundle.txt`).
//!
//! One entry per line:
//! - blank lines and `#` comments are ignored
//! - `*` includes every file of the default search not listed explicitly
//! - `@<path-or-url>` declares a bundle-level reference
//! - anything else names an asset relative to the bundle directory
//!
//! Without `*` the listed order is final and the bundle is pre-sorted.

use rustc_hash::FxHashSet;

use super::BundleKind;
use crate::core::AppPath;
use crate::error::BuildError;
use crate::fs::FileSystem;

pub const DESCRIPTOR_FILE: &str = "bundle.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorEntry {
    File(String),
    Wildcard,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleDescriptor {
    pub entries: Vec<DescriptorEntry>,
    pub references: Vec<String>,
}

impl BundleDescriptor {
    pub fn parse(text: &str) -> Self {
        let mut descriptor = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "*" {
                descriptor.entries.push(DescriptorEntry::Wildcard);
            } else if let Some(reference) = line.strip_prefix('@') {
                descriptor.references.push(reference.trim().to_string());
            } else {
                descriptor.entries.push(DescriptorEntry::File(line.to_string()));
            }
        }
        descriptor
    }

    /// Location of the descriptor of `dir`.
    pub fn path_in(dir: &AppPath) -> Result<AppPath, BuildError> {
        dir.join(DESCRIPTOR_FILE)
            .map_err(|e| BuildError::path(dir, None, e))
    }

    /// Load `<dir>/bundle.txt`, if present.
    pub fn load(fs: &dyn FileSystem, dir: &AppPath) -> Result<Option<Self>, BuildError> {
        let path = Self::path_in(dir)?;
        if !fs.exists(&path) {
            return Ok(None);
        }
        let bytes = fs.read(&path).map_err(|e| BuildError::io(&path, e))?;
        Ok(Some(Self::parse(&String::from_utf8_lossy(&bytes))))
    }

    pub fn is_pre_sorted(&self) -> bool {
        !self.entries.contains(&DescriptorEntry::Wildcard)
    }

    /// Asset files named by the descriptor, in order, without duplicates.
    pub fn resolve_files(
        &self,
        fs: &dyn FileSystem,
        dir: &AppPath,
        kind: BundleKind,
    ) -> Result<Vec<AppPath>, BuildError> {
        let mut explicit = Vec::new();
        for entry in &self.entries {
            if let DescriptorEntry::File(name) = entry {
                let path = dir.join(name).map_err(|e| BuildError::path(dir, None, e))?;
                if !fs.exists(&path) {
                    return Err(BuildError::MissingFile {
                        bundle: dir.to_string(),
                        path: path.to_string(),
                    });
                }
                explicit.push(path);
            }
        }

        let listed: FxHashSet<AppPath> = explicit.iter().cloned().collect();
        let mut seen = FxHashSet::default();
        let mut files = Vec::new();
        let mut explicit = explicit.into_iter();

        for entry in &self.entries {
            match entry {
                DescriptorEntry::File(_) => {
                    if let Some(path) = explicit.next()
                        && seen.insert(path.clone())
                    {
                        files.push(path);
                    }
                }
                DescriptorEntry::Wildcard => {
                    for path in default_search(fs, dir, kind)? {
                        if !listed.contains(&path) && seen.insert(path.clone()) {
                            files.push(path);
                        }
                    }
                }
            }
        }

        Ok(files)
    }
}

/// Files of `kind` under `dir`, recursively, sorted by path.
pub fn default_search(
    fs: &dyn FileSystem,
    dir: &AppPath,
    kind: BundleKind,
) -> Result<Vec<AppPath>, BuildError> {
    let files = fs.list_files(dir, true).map_err(|e| BuildError::io(dir, e))?;
    Ok(files.into_iter().filter(|path| kind.accepts(path)).collect())
}
