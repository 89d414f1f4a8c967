//! Build service: owns the current bundle snapshot and rebuilds it.
//!
//! Readers take a consistent `Arc<BundleContainer>` with [`BuildService::snapshot`];
//! a rebuild swaps in a new container only when it fully succeeds.

pub mod debouncer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::bundle::{BundleDefinition, ProcessSettings, discover};
use crate::cache::{ManifestCache, SourceTree, restore};
use crate::container::BundleContainer;
use crate::error::BuildError;
use crate::fs::SharedFileSystem;

/// Everything a build needs besides the file system and the cache.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub definitions: Vec<BundleDefinition>,
    pub process: ProcessSettings,
    /// Cache version; a manifest with another version is never reused.
    pub version: String,
    pub url_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSource {
    /// Restored from the manifest cache.
    Cache,
    /// Discovered and processed from sources.
    Fresh,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub source: BuildSource,
    pub bundles: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    Rebuilt(BuildReport),
    /// Another rebuild was running and will pick this request up.
    Coalesced,
}

pub struct BuildService {
    settings: BuildSettings,
    fs: SharedFileSystem,
    cache: ManifestCache,
    snapshot: ArcSwapOption<BundleContainer>,
    rebuild_lock: Mutex<()>,
    pending: AtomicBool,
}

impl BuildService {
    pub fn new(settings: BuildSettings, fs: SharedFileSystem, cache: ManifestCache) -> Self {
        Self {
            settings,
            fs,
            cache,
            snapshot: ArcSwapOption::empty(),
            rebuild_lock: Mutex::new(()),
            pending: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    /// Current container, `None` before the first successful build.
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<BundleContainer>> {
        self.snapshot.load_full()
    }

    /// First build; tries the cache before processing sources.
    pub fn initialize(&self) -> Result<BuildReport, BuildError> {
        let _guard = self.rebuild_lock.lock();
        self.pending.store(false, Ordering::SeqCst);
        self.build_and_swap()
    }

    /// Rebuild and swap the snapshot.
    ///
    /// Requests arriving while a rebuild runs are folded into it: the caller
    /// gets `Coalesced` and the running rebuild loops once more, even after a
    /// failed pass. On error the previous snapshot stays in place; the error is
    /// returned only when it came from the last pass.
    pub fn rebuild(&self) -> Result<RebuildOutcome, BuildError> {
        self.pending.store(true, Ordering::SeqCst);
        let mut result: Result<Option<BuildReport>, BuildError> = Ok(None);

        loop {
            let Some(guard) = self.rebuild_lock.try_lock() else {
                break;
            };
            while self.pending.swap(false, Ordering::SeqCst) {
                result = self.build_and_swap().map(Some);
                if let Err(e) = &result {
                    crate::debug!("build"; "rebuild failed: {}", e);
                }
            }
            drop(guard);

            // a request may have slipped in between the last swap and the unlock
            if !self.pending.load(Ordering::SeqCst) {
                break;
            }
        }

        result.map(|last| last.map_or(RebuildOutcome::Coalesced, RebuildOutcome::Rebuilt))
    }

    /// Drop the snapshot. Readers holding an `Arc` keep their copy.
    pub fn dispose(&self) {
        self.snapshot.store(None);
    }

    fn build_and_swap(&self) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let (container, source) = self.build()?;
        let report = BuildReport {
            source,
            bundles: container.len(),
            elapsed: start.elapsed(),
        };
        self.snapshot.store(Some(Arc::new(container)));
        crate::debug!(
            "build";
            "{} bundles from {:?} in {:?}",
            report.bundles,
            report.source,
            report.elapsed
        );
        Ok(report)
    }

    fn build(&self) -> Result<(BundleContainer, BuildSource), BuildError> {
        let mut bundles = discover(&self.settings.definitions, &self.fs)?;
        let optimize = self.settings.process.optimize;

        if optimize {
            let tree = SourceTree::from_bundles(&bundles);
            if let Some(container) = self.try_cache(&tree) {
                return Ok((container, BuildSource::Cache));
            }
        }

        for bundle in &mut bundles {
            bundle.process(&self.settings.process)?;
        }
        let container = BundleContainer::new(bundles)?;

        if optimize
            && let Err(e) = self.cache.save(&container, &self.settings.version, self.fs.as_ref())
        {
            crate::debug!("cache"; "failed to save manifest: {}", e);
        }

        Ok((container, BuildSource::Fresh))
    }

    fn try_cache(&self, tree: &SourceTree) -> Option<BundleContainer> {
        let manifest = self.cache.load()?;
        if !manifest.is_up_to_date(&self.settings.version, tree, self.fs.as_ref()) {
            return None;
        }
        let bundles = restore(&manifest, &self.cache)?;
        match BundleContainer::new(bundles) {
            Ok(container) => Some(container),
            Err(e) => {
                crate::debug!("cache"; "restored bundles rejected: {}", e);
                None
            }
        }
    }
}
