//! Manifest data structures and freshness check.

use std::io;
use std::time::SystemTime;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::SourceTree;
use crate::asset::{Asset, AssetReference, ReferenceKind, ReferenceTarget};
use crate::bundle::{Bundle, BundleKind, BundleReference, BundleState};
use crate::container::BundleContainer;
use crate::core::{AppPath, ContentHash};
use crate::fs::{FileSystem, to_millis};

/// Manifest file name (inside the cache directory)
pub const MANIFEST_FILE: &str = "manifest.json";

/// Snapshot of a processed build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Cache version fingerprint; a mismatch invalidates everything.
    pub version: String,
    /// Creation time (Unix milliseconds)
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub bundles: Vec<BundleManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub path: AppPath,
    pub kind: BundleKind,
    /// Bundle content hash (joined bundles only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<ContentHash>,
    /// Content file name inside the cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<BundleReference>,
    /// Asset order came from a descriptor and was not dependency-sorted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pre_sorted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<FileStamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<AssetManifest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_files: Vec<FileStamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub path: AppPath,
    /// Last-write time at build (Unix milliseconds)
    pub modified: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ReferenceManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceManifest {
    pub target: ReferenceTarget,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub path: AppPath,
    pub modified: u64,
}

impl Manifest {
    /// Snapshot every bundle of `container`, stamping sources through `fs`.
    ///
    /// Content file names are filled in when the content is written.
    pub fn from_container(
        container: &BundleContainer,
        version: &str,
        fs: &dyn FileSystem,
    ) -> io::Result<Self> {
        let bundles = container
            .bundles()
            .iter()
            .map(|bundle| BundleManifest::from_bundle(bundle, fs))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self {
            version: version.to_string(),
            created_at: to_millis(SystemTime::now()),
            bundles,
        })
    }

    /// Recorded bundle -> assets mapping (external bundles excluded).
    pub fn source_tree(&self) -> SourceTree {
        let mut tree = SourceTree::default();
        for bundle in self.bundles.iter().filter(|b| b.external_url.is_none()) {
            tree.insert(
                bundle.path.clone(),
                bundle.assets.iter().map(|a| a.path.clone()),
                bundle.pre_sorted,
                bundle.references.iter().cloned(),
            );
        }
        tree
    }

    /// Check whether this manifest still describes the sources.
    ///
    /// Stale when the version differs, the bundles, their assets or their
    /// references changed, or any recorded file (descriptors included) is
    /// missing or newer than recorded.
    pub fn is_up_to_date(&self, version: &str, current: &SourceTree, fs: &dyn FileSystem) -> bool {
        if self.version != version {
            crate::debug!("cache"; "version changed ({} -> {})", self.version, version);
            return false;
        }

        if let Some(difference) = self.source_tree().describe_difference(current) {
            crate::debug!("cache"; "{}", difference);
            return false;
        }

        let stamps = self.bundles.iter().flat_map(|bundle| {
            bundle
                .assets
                .iter()
                .map(|a| (&a.path, a.modified))
                .chain(bundle.descriptor.iter().map(|f| (&f.path, f.modified)))
                .chain(bundle.raw_files.iter().map(|f| (&f.path, f.modified)))
        });

        for (path, recorded) in stamps {
            match fs.modified(path) {
                Ok(time) => {
                    let current = to_millis(time);
                    if current > recorded || current > self.created_at {
                        crate::debug!("cache"; "{} modified", path);
                        return false;
                    }
                }
                Err(_) => {
                    crate::debug!("cache"; "{} missing", path);
                    return false;
                }
            }
        }

        true
    }
}

impl BundleManifest {
    fn from_bundle(bundle: &Bundle, fs: &dyn FileSystem) -> io::Result<Self> {
        let mut manifest = Self {
            path: bundle.path().clone(),
            kind: bundle.kind(),
            hash: None,
            content_file: None,
            external_url: bundle.external_url().map(str::to_string),
            references: bundle.references().to_vec(),
            pre_sorted: bundle.is_pre_sorted(),
            descriptor: None,
            assets: Vec::new(),
            raw_files: Vec::new(),
        };
        if bundle.is_external() {
            return Ok(manifest);
        }

        if let Some(path) = bundle.descriptor() {
            manifest.descriptor = Some(FileStamp {
                path: path.clone(),
                modified: to_millis(fs.modified(path)?),
            });
        }

        if bundle.state() >= BundleState::Concatenated {
            manifest.hash = bundle.hash();
        }

        let mut leaves = Vec::new();
        bundle.walk_assets(&mut |asset| leaves.push(asset));
        for asset in leaves {
            match asset {
                Asset::Cached(cached) => {
                    for source in cached.sources() {
                        let references = asset
                            .references()
                            .into_iter()
                            .filter(|r| r.source == *source)
                            .map(ReferenceManifest::from)
                            .collect();
                        manifest.assets.push(AssetManifest {
                            path: source.clone(),
                            modified: to_millis(fs.modified(source)?),
                            references,
                        });
                    }
                }
                _ => manifest.assets.push(AssetManifest {
                    path: asset.path().clone(),
                    modified: to_millis(fs.modified(asset.path())?),
                    references: asset.references().into_iter().map(ReferenceManifest::from).collect(),
                }),
            }
        }

        let mut seen = FxHashSet::default();
        for target in bundle.asset_references(ReferenceKind::RawFile) {
            let Some(path) = target.path() else { continue };
            if !seen.insert(path.clone()) {
                continue;
            }
            match fs.modified(path) {
                Ok(time) => manifest.raw_files.push(FileStamp {
                    path: path.clone(),
                    modified: to_millis(time),
                }),
                Err(_) => crate::debug!("cache"; "raw file {} not found, not tracked", path),
            }
        }

        Ok(manifest)
    }

    /// References recorded for `asset`, rebuilt with their source.
    pub fn asset_references(&self) -> Vec<AssetReference> {
        self.assets
            .iter()
            .flat_map(|asset| {
                asset.references.iter().map(|r| {
                    AssetReference::new(asset.path.clone(), r.target.clone(), r.line)
                })
            })
            .collect()
    }
}

impl From<&AssetReference> for ReferenceManifest {
    fn from(reference: &AssetReference) -> Self {
        Self {
            target: reference.target.clone(),
            line: reference.source_line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleDefinition, ProcessSettings, discover};
    use crate::fs::{MemoryFileSystem, SharedFileSystem};
    use std::sync::Arc;
    use std::time::{Duration, UNIX_EPOCH};

    fn p(raw: &str) -> AppPath {
        AppPath::normalize(raw).unwrap()
    }

    fn fixture() -> Arc<MemoryFileSystem> {
        Arc::new(
            MemoryFileSystem::new()
                .with_file("~/app/a.js", "/// <reference path=\"b.js\" />\na")
                .with_file("~/app/b.js", "b")
                .with_file("~/css/site.css", "a{background:url(img/x.png)}")
                .with_file("~/css/img/x.png", "png"),
        )
    }

    fn definitions() -> Vec<BundleDefinition> {
        vec![BundleDefinition::new("~/app"), BundleDefinition::new("~/css")]
    }

    fn snapshot(fs: &SharedFileSystem) -> Manifest {
        let mut bundles = discover(&definitions(), fs).unwrap();
        for bundle in &mut bundles {
            bundle.process(&ProcessSettings::default()).unwrap();
        }
        let container = BundleContainer::new(bundles).unwrap();
        Manifest::from_container(&container, "v1", fs.as_ref()).unwrap()
    }

    fn current_tree(fs: &SharedFileSystem) -> SourceTree {
        SourceTree::from_bundles(&discover(&definitions(), fs).unwrap())
    }

    #[test]
    fn test_snapshot_contents() {
        let memory = fixture();
        let fs: SharedFileSystem = memory.clone();
        let manifest = snapshot(&fs);

        assert_eq!(manifest.bundles.len(), 2);
        let app = &manifest.bundles[0];
        assert_eq!(app.path, p("~/app"));
        assert!(app.hash.is_some());
        let order: Vec<&str> = app.assets.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(order, vec!["~/app/b.js", "~/app/a.js"]);
        assert_eq!(app.asset_references().len(), 1);

        let css = &manifest.bundles[1];
        assert_eq!(css.raw_files.len(), 1);
        assert_eq!(css.raw_files[0].path, p("~/css/img/x.png"));
    }

    #[test]
    fn test_json_roundtrip() {
        let fs: SharedFileSystem = fixture();
        let manifest = snapshot(&fs);
        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let parsed: Manifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_up_to_date_until_touched() {
        let memory = fixture();
        let fs: SharedFileSystem = memory.clone();
        let manifest = snapshot(&fs);
        assert!(manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));
        assert!(!manifest.is_up_to_date("v2", &current_tree(&fs), fs.as_ref()));

        let later = UNIX_EPOCH + MemoryFileSystem::DEFAULT_MODIFIED + Duration::from_secs(60);
        memory.touch("~/app/b.js", later);
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));
    }

    #[test]
    fn test_added_file_is_stale() {
        let memory = fixture();
        let fs: SharedFileSystem = memory.clone();
        let manifest = snapshot(&fs);
        memory.insert("~/app/c.js", "c");
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));
    }

    #[test]
    fn test_descriptor_changes_are_stale() {
        let memory = fixture();
        memory.insert("~/app/bundle.txt", "a.js\nb.js\n");
        let fs: SharedFileSystem = memory.clone();
        let manifest = snapshot(&fs);
        let app = &manifest.bundles[0];
        assert!(app.pre_sorted);
        assert_eq!(app.descriptor.as_ref().map(|d| d.path.as_str()), Some("~/app/bundle.txt"));
        let order: Vec<&str> = app.assets.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(order, vec!["~/app/a.js", "~/app/b.js"]);
        assert!(manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));

        // same timestamp, new order
        memory.insert("~/app/bundle.txt", "b.js\na.js\n");
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));

        // same list, new bundle reference
        memory.insert("~/app/bundle.txt", "a.js\nb.js\n@~/css\n");
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));

        // same content, touched
        let later = UNIX_EPOCH + MemoryFileSystem::DEFAULT_MODIFIED + Duration::from_secs(1);
        memory.insert_at("~/app/bundle.txt", "a.js\nb.js\n", later);
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));
    }

    #[test]
    fn test_removed_or_touched_raw_file_is_stale() {
        let memory = fixture();
        let fs: SharedFileSystem = memory.clone();
        let manifest = snapshot(&fs);

        let later = UNIX_EPOCH + MemoryFileSystem::DEFAULT_MODIFIED + Duration::from_secs(1);
        memory.touch("~/css/img/x.png", later);
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));

        memory.remove("~/css/img/x.png");
        assert!(!manifest.is_up_to_date("v1", &current_tree(&fs), fs.as_ref()));
    }
}
