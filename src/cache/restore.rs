//! Rebuild bundles from a manifest without touching the sources.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use super::ManifestCache;
use super::manifest::Manifest;
use crate::asset::{Asset, CachedAsset, ContentLoader};
use crate::bundle::Bundle;
use crate::fs::Stream;

/// Restore the local bundles recorded in `manifest`.
///
/// Returns `None` when any content file is missing; external bundles are
/// re-created by the container.
pub fn restore(manifest: &Manifest, cache: &ManifestCache) -> Option<Vec<Bundle>> {
    let mut bundles = Vec::new();

    for entry in manifest.bundles.iter().filter(|b| b.external_url.is_none()) {
        let asset = match (&entry.content_file, entry.hash) {
            (Some(name), Some(hash)) => {
                let path = cache.content_path(name);
                if !path.is_file() {
                    crate::debug!("cache"; "content file {} missing", name);
                    return None;
                }
                let sources = entry.assets.iter().map(|a| a.path.clone()).collect();
                Some(Asset::Cached(CachedAsset::new(
                    entry.path.clone(),
                    sources,
                    hash,
                    entry.asset_references(),
                    loader(path),
                )))
            }
            _ if entry.assets.is_empty() => None,
            _ => {
                crate::debug!("cache"; "bundle {} has no cached content", entry.path);
                return None;
            }
        };

        let mut bundle = Bundle::restored(
            entry.path.clone(),
            entry.kind,
            asset,
            entry.references.clone(),
        );
        if entry.pre_sorted {
            bundle.mark_pre_sorted();
        }
        if let Some(descriptor) = &entry.descriptor {
            bundle.set_descriptor(descriptor.path.clone());
        }
        bundles.push(bundle);
    }

    Some(bundles)
}

fn loader(path: PathBuf) -> ContentLoader {
    Arc::new(move || {
        let file = File::open(&path)?;
        Ok(Box::new(BufReader::new(file)) as Stream)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleDefinition, ProcessSettings, discover};
    use crate::container::BundleContainer;
    use crate::core::AppPath;
    use crate::fs::{MemoryFileSystem, SharedFileSystem};
    use tempfile::TempDir;

    fn saved_cache(dir: &TempDir) -> (ManifestCache, Manifest) {
        let fs: SharedFileSystem = Arc::new(
            MemoryFileSystem::new()
                .with_file("~/app/a.js", "/// <reference path=\"~/lib/l.js\" />\na")
                .with_file("~/app/b.js", "b")
                .with_file("~/lib/l.js", "/// <reference path=\"https://cdn.example.com/x.js\" />"),
        );
        let definitions = [BundleDefinition::new("~/app"), BundleDefinition::new("~/lib")];
        let mut bundles = discover(&definitions, &fs).unwrap();
        let settings = ProcessSettings {
            minify: false,
            ..ProcessSettings::default()
        };
        for bundle in &mut bundles {
            bundle.process(&settings).unwrap();
        }
        let container = BundleContainer::new(bundles).unwrap();
        let cache = ManifestCache::new(dir.path());
        let manifest = cache.save(&container, "v1", fs.as_ref()).unwrap();
        (cache, manifest)
    }

    #[test]
    fn test_restored_bundles_link_again() {
        let dir = TempDir::new().unwrap();
        let (cache, manifest) = saved_cache(&dir);

        let bundles = restore(&manifest, &cache).unwrap();
        assert_eq!(bundles.len(), 2);
        let container = BundleContainer::new(bundles).unwrap();
        assert_eq!(container.len(), 3);

        let app = container
            .get(&AppPath::normalize("~/app").unwrap())
            .unwrap();
        let names: Vec<&str> = container
            .add_dependencies_and_sort([app])
            .iter()
            .map(|b| b.path().as_str())
            .collect();
        assert_eq!(names, vec!["https://cdn.example.com/x.js", "~/lib", "~/app"]);
        assert_eq!(
            app.assets()[0].read().unwrap(),
            b"/// <reference path=\"~/lib/l.js\" />\na\r\nb"
        );
    }

    #[test]
    fn test_missing_content_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let (cache, manifest) = saved_cache(&dir);
        let name = manifest.bundles[0].content_file.clone().unwrap();
        std::fs::remove_file(cache.content_path(&name)).unwrap();
        assert!(restore(&manifest, &cache).is_none());
    }
}
