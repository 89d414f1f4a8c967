//! Bundle discovery from configured definitions.
//!
//! Discovery only lists files and reads descriptors; asset contents are
//! not touched until a pipeline runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::descriptor::{BundleDescriptor, DescriptorEntry, default_search};
use super::{Bundle, BundleKind, Pipeline, Step};
use crate::asset::{Asset, FileAsset};
use crate::core::AppPath;
use crate::error::BuildError;
use crate::fs::SharedFileSystem;

/// One `[[bundles]]` entry of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    /// Directory or single file, relative to the source root.
    pub path: String,

    /// Inferred from file extensions when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BundleKind>,

    /// Make one bundle per file instead of one for the directory.
    #[serde(default)]
    pub per_file: bool,

    /// Overrides the default steps of the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<Step>>,

    /// Extra bundle-level references (paths or URLs).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl BundleDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            per_file: false,
            pipeline: None,
            references: Vec::new(),
        }
    }
}

/// Discover the bundles described by `definitions`.
pub fn discover(
    definitions: &[BundleDefinition],
    fs: &SharedFileSystem,
) -> Result<Vec<Bundle>, BuildError> {
    let mut bundles = Vec::new();
    for definition in definitions {
        bundles.extend(discover_one(definition, fs)?);
    }
    Ok(bundles)
}

fn discover_one(
    definition: &BundleDefinition,
    fs: &SharedFileSystem,
) -> Result<Vec<Bundle>, BuildError> {
    let path = AppPath::normalize(&definition.path)
        .map_err(|e| BuildError::path(&definition.path, None, e))?;

    let mut bundles = if fs.exists(&path) {
        let kind = definition
            .kind
            .or_else(|| BundleKind::from_path(&path))
            .ok_or_else(|| {
                BuildError::Definition(format!("cannot infer bundle kind of `{path}`"))
            })?;
        vec![single_file(&path, kind, fs)]
    } else if fs.is_dir(&path) {
        if definition.per_file {
            per_file(&path, definition.kind, fs)?
        } else {
            vec![directory(&path, definition.kind, fs)?]
        }
    } else {
        return Err(BuildError::MissingFile {
            bundle: definition.path.clone(),
            path: path.to_string(),
        });
    };

    for bundle in &mut bundles {
        for reference in &definition.references {
            bundle.add_reference(reference)?;
        }
        if let Some(steps) = &definition.pipeline {
            bundle.set_pipeline(Pipeline::new(steps.clone()));
        }
    }

    crate::debug!("discover"; "{} -> {} bundle(s)", path, bundles.len());
    Ok(bundles)
}

fn leaf(path: AppPath, fs: &SharedFileSystem) -> Asset {
    Asset::Leaf(FileAsset::new(path, Arc::clone(fs)))
}

fn single_file(path: &AppPath, kind: BundleKind, fs: &SharedFileSystem) -> Bundle {
    let mut bundle = Bundle::new(path.clone(), kind);
    bundle.add_assets([leaf(path.clone(), fs)], true);
    bundle
}

fn per_file(
    dir: &AppPath,
    kind: Option<BundleKind>,
    fs: &SharedFileSystem,
) -> Result<Vec<Bundle>, BuildError> {
    let files = fs.list_files(dir, true).map_err(|e| BuildError::io(dir, e))?;
    Ok(files
        .iter()
        .filter_map(|file| {
            let file_kind = BundleKind::from_path(file)?;
            kind.is_none_or(|k| k == file_kind)
                .then(|| single_file(file, file_kind, fs))
        })
        .collect())
}

fn directory(
    dir: &AppPath,
    kind: Option<BundleKind>,
    fs: &SharedFileSystem,
) -> Result<Bundle, BuildError> {
    let descriptor = BundleDescriptor::load(fs.as_ref(), dir)?;
    let kind = match kind {
        Some(kind) => kind,
        None => infer_kind(dir, descriptor.as_ref(), fs)?,
    };

    let mut bundle = Bundle::new(dir.clone(), kind);
    match descriptor {
        Some(descriptor) => {
            bundle.set_descriptor(BundleDescriptor::path_in(dir)?);
            let files = descriptor.resolve_files(fs.as_ref(), dir, kind)?;
            bundle.add_assets(files.into_iter().map(|f| leaf(f, fs)), descriptor.is_pre_sorted());
            for reference in &descriptor.references {
                bundle.add_reference(reference)?;
            }
        }
        None => {
            let files = default_search(fs.as_ref(), dir, kind)?;
            bundle.add_assets(files.into_iter().map(|f| leaf(f, fs)), false);
        }
    }
    Ok(bundle)
}

/// Kind of the first recognizable file (descriptor entries first).
fn infer_kind(
    dir: &AppPath,
    descriptor: Option<&BundleDescriptor>,
    fs: &SharedFileSystem,
) -> Result<BundleKind, BuildError> {
    let listed = descriptor.into_iter().flat_map(|d| &d.entries).find_map(|entry| match entry {
        DescriptorEntry::File(name) => {
            dir.join(name).ok().and_then(|p| BundleKind::from_path(&p))
        }
        DescriptorEntry::Wildcard => None,
    });
    if let Some(kind) = listed {
        return Ok(kind);
    }

    let files = fs.list_files(dir, true).map_err(|e| BuildError::io(dir, e))?;
    files
        .iter()
        .find_map(BundleKind::from_path)
        .ok_or_else(|| BuildError::Definition(format!("cannot infer bundle kind of `{dir}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::BundleState;
    use crate::fs::MemoryFileSystem;

    fn shared(fs: MemoryFileSystem) -> SharedFileSystem {
        Arc::new(fs)
    }

    fn fixture() -> SharedFileSystem {
        shared(
            MemoryFileSystem::new()
                .with_file("~/scripts/app/b.js", "b")
                .with_file("~/scripts/app/a.js", "a")
                .with_file("~/scripts/pages/home.js", "h")
                .with_file("~/scripts/pages/about.js", "x")
                .with_file("~/styles/site.css", "s"),
        )
    }

    fn paths(bundle: &Bundle) -> Vec<&str> {
        bundle.assets().iter().map(|a| a.path().as_str()).collect()
    }

    #[test]
    fn test_directory_default_search() {
        let fs = fixture();
        let bundles = discover(&[BundleDefinition::new("~/scripts/app")], &fs).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].kind(), BundleKind::Script);
        assert_eq!(paths(&bundles[0]), vec!["~/scripts/app/a.js", "~/scripts/app/b.js"]);
        assert_eq!(bundles[0].state(), BundleState::Unsorted);
        assert!(bundles[0].descriptor().is_none());
        assert!(!bundles[0].is_pre_sorted());
    }

    #[test]
    fn test_descriptor_order_is_final() {
        let fs = shared(
            MemoryFileSystem::new()
                .with_file("~/app/a.js", "a")
                .with_file("~/app/b.js", "b")
                .with_file("~/app/bundle.txt", "b.js\na.js\n@~/lib\n")
                .with_file("~/lib/x.js", "x"),
        );
        let bundles = discover(&[BundleDefinition::new("app")], &fs).unwrap();
        assert_eq!(paths(&bundles[0]), vec!["~/app/b.js", "~/app/a.js"]);
        assert!(bundles[0].has_sorted_assets());
        assert!(bundles[0].is_pre_sorted());
        assert_eq!(bundles[0].descriptor().map(|d| d.as_str()), Some("~/app/bundle.txt"));
        assert_eq!(bundles[0].references().len(), 1);
    }

    #[test]
    fn test_per_file_and_single_file() {
        let fs = fixture();
        let definitions = vec![
            BundleDefinition {
                per_file: true,
                ..BundleDefinition::new("~/scripts/pages")
            },
            BundleDefinition::new("~/styles/site.css"),
        ];
        let bundles = discover(&definitions, &fs).unwrap();
        let names: Vec<&str> = bundles.iter().map(|b| b.path().as_str()).collect();
        assert_eq!(
            names,
            vec!["~/scripts/pages/about.js", "~/scripts/pages/home.js", "~/styles/site.css"]
        );
        assert_eq!(bundles[2].kind(), BundleKind::Stylesheet);
    }

    #[test]
    fn test_definition_overrides() {
        let fs = fixture();
        let definition = BundleDefinition {
            kind: Some(BundleKind::Script),
            pipeline: Some(vec![Step::Sort]),
            references: vec!["https://cdn.example.com/x.js".into()],
            ..BundleDefinition::new("~/scripts/app")
        };
        let bundles = discover(&[definition], &fs).unwrap();
        assert_eq!(bundles[0].pipeline().steps(), &[Step::Sort]);
        assert_eq!(bundles[0].references().len(), 1);
    }

    #[test]
    fn test_missing_path_is_error() {
        let fs = fixture();
        let err = discover(&[BundleDefinition::new("~/nope")], &fs).unwrap_err();
        assert!(matches!(err, BuildError::MissingFile { .. }));
    }

    #[test]
    fn test_discovery_reads_no_assets() {
        let memory = Arc::new(MemoryFileSystem::new().with_file("~/app/a.js", "a"));
        let fs: SharedFileSystem = memory.clone();
        discover(&[BundleDefinition::new("~/app")], &fs).unwrap();
        assert_eq!(memory.open_count(), 0);
    }
}
