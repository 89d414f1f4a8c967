//! The set of bundles of one build, linked into a dependency graph.
//!
//! Construction validates every cross-bundle reference, synthesizes one
//! external bundle per referenced URL, and fixes a global order in which
//! dependencies come before their dependents.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::asset::{Asset, ReferenceTarget};
use crate::bundle::{Bundle, BundleKind, BundleReference};
use crate::core::AppPath;
use crate::error::{AssetReferenceError, BuildError};
use crate::graph::Graph;

pub struct BundleContainer {
    bundles: Vec<Bundle>,
    index: FxHashMap<AppPath, usize>,
    dependencies: Vec<Vec<usize>>,
    /// Position of each bundle in the global order.
    sort_index: Vec<usize>,
}

impl BundleContainer {
    pub fn new(mut bundles: Vec<Bundle>) -> Result<Self, BuildError> {
        let mut index = FxHashMap::default();
        for (i, bundle) in bundles.iter().enumerate() {
            if index.insert(bundle.path().clone(), i).is_some() {
                return Err(BuildError::Definition(format!(
                    "bundle `{}` is defined more than once",
                    bundle.path()
                )));
            }
        }

        let errors = validate(&bundles, &index);
        if !errors.is_empty() {
            return Err(BuildError::References(errors));
        }

        for (url, kind) in referenced_urls(&bundles) {
            let external = Bundle::external(&url, kind);
            index.insert(external.path().clone(), bundles.len());
            bundles.push(external);
        }

        let dependencies: Vec<Vec<usize>> = (0..bundles.len())
            .map(|i| immediate_dependencies(i, &bundles, &index))
            .collect();

        let graph = Graph::new(0..bundles.len(), |&i| dependencies[i].clone());
        let order = graph.topological_sort().map_err(|cycles| BuildError::Cycles {
            subject: "bundle",
            cycles: cycles
                .0
                .iter()
                .map(|cycle| cycle.iter().map(|&i| bundles[i].path().to_string()).collect())
                .collect(),
        })?;

        let mut sort_index = vec![0; bundles.len()];
        for (position, &i) in order.iter().enumerate() {
            sort_index[i] = position;
        }

        Ok(Self {
            bundles,
            index,
            dependencies,
            sort_index,
        })
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Bundle with exactly this path (or URL address).
    pub fn get(&self, path: &AppPath) -> Option<&Bundle> {
        self.index.get(path).map(|&i| &self.bundles[i])
    }

    /// All bundles in global dependency order.
    pub fn sorted(&self) -> Vec<&Bundle> {
        let mut all: Vec<usize> = (0..self.bundles.len()).collect();
        all.sort_by_key(|&i| self.sort_index[i]);
        all.into_iter().map(|i| &self.bundles[i]).collect()
    }

    /// Bundle whose path, URL or assets match `path`.
    pub fn find_bundle_containing_path(&self, path: &AppPath) -> Option<&Bundle> {
        find_index(&self.bundles, &self.index, path).map(|i| &self.bundles[i])
    }

    /// Leaf asset with `path`, together with its bundle.
    pub fn find_asset(&self, path: &AppPath) -> Option<(&Bundle, &Asset)> {
        self.bundles
            .iter()
            .find_map(|bundle| bundle.find_asset_by_path(path).map(|asset| (bundle, asset)))
    }

    /// `wanted` plus all their transitive dependencies, each once, in global order.
    pub fn add_dependencies_and_sort<'a>(
        &'a self,
        wanted: impl IntoIterator<Item = &'a Bundle>,
    ) -> Vec<&'a Bundle> {
        let mut seen = FxHashSet::default();
        let mut pending: Vec<usize> = wanted
            .into_iter()
            .filter_map(|bundle| self.index.get(bundle.path()).copied())
            .collect();

        while let Some(i) = pending.pop() {
            if seen.insert(i) {
                pending.extend(self.dependencies[i].iter().filter(|d| !seen.contains(*d)));
            }
        }

        let mut result: Vec<usize> = seen.into_iter().collect();
        result.sort_by_key(|&i| self.sort_index[i]);
        result.into_iter().map(|i| &self.bundles[i]).collect()
    }

    /// Resolve paths to their bundles, then close over dependencies.
    pub fn resolve(&self, paths: &[AppPath]) -> Result<Vec<&Bundle>, BuildError> {
        let mut wanted = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();
        for path in paths {
            match self.find_bundle_containing_path(path) {
                Some(bundle) => wanted.push(bundle),
                None => errors.push(AssetReferenceError::new("request", path.as_str(), None)),
            }
        }
        if !errors.is_empty() {
            return Err(BuildError::References(errors));
        }
        Ok(self.add_dependencies_and_sort(wanted))
    }
}

fn find_index(bundles: &[Bundle], index: &FxHashMap<AppPath, usize>, path: &AppPath) -> Option<usize> {
    index
        .get(path)
        .copied()
        .or_else(|| bundles.iter().position(|bundle| bundle.contains_path(path)))
}

/// Unresolvable cross-bundle and bundle-level references.
fn validate(bundles: &[Bundle], index: &FxHashMap<AppPath, usize>) -> Vec<AssetReferenceError> {
    let mut errors = Vec::new();
    for bundle in bundles {
        for asset in bundle.assets() {
            for reference in asset.references() {
                let found = match &reference.target {
                    ReferenceTarget::SameBundle(target) => bundle.contains_path(target),
                    ReferenceTarget::DifferentBundle(target) => {
                        find_index(bundles, index, target).is_some()
                    }
                    ReferenceTarget::Url(_) | ReferenceTarget::RawFile(_) => true,
                };
                if !found {
                    errors.push(AssetReferenceError::new(
                        reference.source.as_str(),
                        reference.target.as_str(),
                        reference.source_line,
                    ));
                }
            }
        }
        for reference in bundle.references() {
            if let BundleReference::Path(target) = reference
                && find_index(bundles, index, target).is_none()
            {
                errors.push(AssetReferenceError::new(
                    bundle.path().as_str(),
                    target.as_str(),
                    None,
                ));
            }
        }
    }
    errors
}

/// Distinct URLs (case-insensitive) in first-seen order, with the kind of
/// the first bundle referencing each.
fn referenced_urls(bundles: &[Bundle]) -> Vec<(String, BundleKind)> {
    let mut seen = FxHashSet::default();
    let mut urls = Vec::new();
    for bundle in bundles.iter().filter(|b| !b.is_external()) {
        let from_assets = bundle.assets().iter().flat_map(Asset::references).filter_map(|r| {
            match &r.target {
                ReferenceTarget::Url(url) => Some(url.as_str()),
                _ => None,
            }
        });
        let from_bundle = bundle.references().iter().filter_map(|r| match r {
            BundleReference::Url(url) => Some(url.as_str()),
            BundleReference::Path(_) => None,
        });
        for url in from_assets.chain(from_bundle) {
            if seen.insert(url.to_ascii_lowercase()) {
                urls.push((url.to_string(), bundle.kind()));
            }
        }
    }
    urls
}

fn immediate_dependencies(
    i: usize,
    bundles: &[Bundle],
    index: &FxHashMap<AppPath, usize>,
) -> Vec<usize> {
    let bundle = &bundles[i];
    let mut targets: Vec<AppPath> = Vec::new();
    for asset in bundle.assets() {
        for reference in asset.references() {
            match &reference.target {
                ReferenceTarget::DifferentBundle(path) => targets.push(path.clone()),
                ReferenceTarget::Url(url) => targets.push(AppPath::external(url)),
                ReferenceTarget::SameBundle(_) | ReferenceTarget::RawFile(_) => {}
            }
        }
    }
    for reference in bundle.references() {
        match reference {
            BundleReference::Path(path) => targets.push(path.clone()),
            BundleReference::Url(url) => targets.push(AppPath::external(url)),
        }
    }

    let mut deps = Vec::new();
    for target in &targets {
        if let Some(dep) = find_index(bundles, index, target)
            && dep != i
            && !deps.contains(&dep)
        {
            deps.push(dep);
        }
    }
    deps
}
