//! On-disk manifest cache.
//!
//! Layout of the cache directory:
//! - `manifest.json` - the [`Manifest`], replaced atomically
//! - `<hash>.<ext>` - one content file per joined bundle, named by the
//!   hash of its output bytes

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::manifest::{MANIFEST_FILE, Manifest};
use crate::bundle::BundleState;
use crate::container::BundleContainer;
use crate::core::ContentHash;
use crate::fs::FileSystem;

#[derive(Debug, Clone)]
pub struct ManifestCache {
    dir: PathBuf,
}

impl ManifestCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn content_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Load the manifest. Any failure means "no cache".
    pub fn load(&self) -> Option<Manifest> {
        let path = self.manifest_path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                crate::debug!("cache"; "no manifest at {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                crate::debug!("cache"; "ignoring unreadable manifest: {}", e);
                None
            }
        }
    }

    /// Persist `container`: content files first, then the manifest, then
    /// prune content files no longer referenced.
    pub fn save(
        &self,
        container: &BundleContainer,
        version: &str,
        fs: &dyn FileSystem,
    ) -> io::Result<Manifest> {
        fs::create_dir_all(&self.dir)?;

        let mut manifest = Manifest::from_container(container, version, fs)?;
        let mut keep = FxHashSet::default();

        for (bundle, entry) in container.bundles().iter().zip(manifest.bundles.iter_mut()) {
            if bundle.is_external() || bundle.state() < BundleState::Concatenated {
                continue;
            }
            let [asset] = bundle.assets() else {
                continue;
            };

            let content = asset.read()?;
            let name = format!(
                "{}.{}",
                ContentHash::of(&content).to_hex(),
                bundle.kind().output_extension()
            );
            let path = self.content_path(&name);
            if !path.is_file() {
                write_atomic(&path, &content)?;
            }
            keep.insert(name.clone());
            entry.content_file = Some(name);
        }

        let json = serde_json::to_vec_pretty(&manifest).map_err(io::Error::other)?;
        write_atomic(&self.manifest_path(), &json)?;

        let pruned = self.prune(&keep)?;
        crate::debug!(
            "cache";
            "saved {} bundles to {} ({} stale files removed)",
            manifest.bundles.len(),
            self.dir.display(),
            pruned
        );
        Ok(manifest)
    }

    /// Remove the whole cache directory.
    pub fn clear(&self) -> io::Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }

    fn prune(&self, keep: &FxHashSet<String>) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == MANIFEST_FILE || keep.contains(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            fs::remove_file(entry.path())?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Write through a temporary sibling and rename into place.
fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BundleDefinition, ProcessSettings, discover};
    use crate::fs::{MemoryFileSystem, SharedFileSystem};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn container(fs: &SharedFileSystem) -> BundleContainer {
        let mut bundles = discover(&[BundleDefinition::new("~/app")], fs).unwrap();
        let settings = ProcessSettings {
            minify: false,
            ..ProcessSettings::default()
        };
        for bundle in &mut bundles {
            bundle.process(&settings).unwrap();
        }
        BundleContainer::new(bundles).unwrap()
    }

    fn fixture() -> SharedFileSystem {
        Arc::new(
            MemoryFileSystem::new()
                .with_file("~/app/a.js", "a")
                .with_file("~/app/b.js", "b"),
        )
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(dir.path().join("cache"));
        let fs = fixture();

        let saved = cache.save(&container(&fs), "v1", fs.as_ref()).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded, saved);

        let name = loaded.bundles[0].content_file.clone().unwrap();
        assert!(name.ends_with(".js"));
        assert_eq!(fs::read(cache.content_path(&name)).unwrap(), b"a\r\nb");
    }

    #[test]
    fn test_missing_or_corrupt_manifest() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(dir.path());
        assert!(cache.load().is_none());

        fs::write(cache.manifest_path(), "{ not json").unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_prunes_stale_content() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(dir.path());
        fs::write(dir.path().join("0000.js"), "old").unwrap();

        let fs = fixture();
        cache.save(&container(&fs), "v1", fs.as_ref()).unwrap();
        assert!(!dir.path().join("0000.js").exists());
        assert!(cache.manifest_path().is_file());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let cache = ManifestCache::new(dir.path().join("cache"));
        let fs = fixture();
        cache.save(&container(&fs), "v1", fs.as_ref()).unwrap();
        cache.clear().unwrap();
        assert!(!cache.dir().exists());
        cache.clear().unwrap();
    }
}
