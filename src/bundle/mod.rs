//! Bundles: ordered groups of assets served as one unit.
//!
//! A bundle moves through `Unsorted -> Sorted -> Concatenated -> Minified`.
//! State only ever advances.

mod css;
pub mod descriptor;
mod factory;
mod kind;
pub mod minify;
mod pipeline;
mod template;

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::asset::parse::scan_css_urls;
use crate::asset::{
    Asset, BundleScope, ClassifyError, ConcatenatedAsset, ReferenceKind, ReferenceTarget,
    SharedTransformer, classify_raw_file, classify_reference,
};
use crate::core::{AppPath, ContentHash, PathError, is_url};
use crate::error::{AssetReferenceError, BuildError};
use crate::graph::Graph;

pub use css::ExpandCssUrls;
pub use factory::{BundleDefinition, discover};
pub use kind::{BundleKind, scan_references};
pub use minify::Minify;
pub use pipeline::{DEFAULT_SEPARATOR, Pipeline, ProcessSettings, Step};
pub use template::WrapHtmlTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BundleState {
    Unsorted,
    Sorted,
    Concatenated,
    Minified,
}

/// Bundle-level reference: another bundle (or anything inside it) or a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BundleReference {
    Path(AppPath),
    Url(String),
}

impl BundleReference {
    /// Parse a bundle-level reference relative to the bundle directory.
    pub fn parse(raw: &str, bundle: &AppPath) -> Result<Self, PathError> {
        let raw = raw.trim();
        if is_url(raw) {
            Ok(Self::Url(raw.to_string()))
        } else {
            bundle.join(raw).map(Self::Path)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Path(path) => path.as_str(),
            Self::Url(url) => url,
        }
    }
}

impl Serialize for BundleReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BundleReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw, &AppPath::root()).map_err(serde::de::Error::custom)
    }
}

pub struct Bundle {
    path: AppPath,
    kind: BundleKind,
    assets: Vec<Asset>,
    references: Vec<BundleReference>,
    state: BundleState,
    external_url: Option<String>,
    pipeline: Pipeline,
    /// Descriptor file the asset list came from.
    descriptor: Option<AppPath>,
    /// Asset order was given explicitly and is part of the bundle identity.
    pre_sorted: bool,
}

impl Bundle {
    pub fn new(path: AppPath, kind: BundleKind) -> Self {
        Self {
            path,
            kind,
            assets: Vec::new(),
            references: Vec::new(),
            state: BundleState::Unsorted,
            external_url: None,
            pipeline: Pipeline::for_kind(kind),
            descriptor: None,
            pre_sorted: false,
        }
    }

    /// Bundle standing for an absolute URL; has no assets and never changes.
    pub fn external(url: &str, kind: BundleKind) -> Self {
        let mut bundle = Self::new(AppPath::external(url), kind);
        bundle.external_url = Some(url.trim().to_string());
        bundle.state = BundleState::Minified;
        bundle
    }

    /// Bundle restored from the cache, already processed.
    pub fn restored(
        path: AppPath,
        kind: BundleKind,
        asset: Option<Asset>,
        references: Vec<BundleReference>,
    ) -> Self {
        let mut bundle = Self::new(path, kind);
        bundle.assets.extend(asset);
        bundle.references = references;
        bundle.state = BundleState::Concatenated;
        bundle
    }

    #[inline]
    pub fn path(&self) -> &AppPath {
        &self.path
    }

    #[inline]
    pub fn kind(&self) -> BundleKind {
        self.kind
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn state(&self) -> BundleState {
        self.state
    }

    pub fn has_sorted_assets(&self) -> bool {
        self.state >= BundleState::Sorted
    }

    pub fn references(&self) -> &[BundleReference] {
        &self.references
    }

    pub fn external_url(&self) -> Option<&str> {
        self.external_url.as_deref()
    }

    pub fn is_external(&self) -> bool {
        self.external_url.is_some()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn set_pipeline(&mut self, pipeline: Pipeline) {
        self.pipeline = pipeline;
    }

    pub fn descriptor(&self) -> Option<&AppPath> {
        self.descriptor.as_ref()
    }

    pub fn set_descriptor(&mut self, path: AppPath) {
        self.descriptor = Some(path);
    }

    pub fn is_pre_sorted(&self) -> bool {
        self.pre_sorted
    }

    pub fn mark_pre_sorted(&mut self) {
        self.pre_sorted = true;
    }

    /// Append assets. `pre_sorted` marks the given order as final.
    pub fn add_assets(&mut self, assets: impl IntoIterator<Item = Asset>, pre_sorted: bool) {
        self.assets.extend(assets);
        if pre_sorted {
            self.pre_sorted = true;
            self.advance(BundleState::Sorted);
        }
    }

    /// Add a bundle-level reference (path relative to the bundle, or URL).
    pub fn add_reference(&mut self, raw: &str) -> Result<(), BuildError> {
        let reference =
            BundleReference::parse(raw, &self.path).map_err(|e| BuildError::path(&self.path, None, e))?;
        if !self.references.contains(&reference) {
            self.references.push(reference);
        }
        Ok(())
    }

    pub fn add_transformer(&mut self, transformer: SharedTransformer) {
        for asset in &mut self.assets {
            asset.add_transformer(Arc::clone(&transformer));
        }
    }

    /// Scan every leaf asset for references and classify them.
    ///
    /// Targets inside the bundle directory that are not assets of this
    /// bundle are collected and reported together.
    pub fn parse_references(&mut self) -> Result<(), BuildError> {
        let members: FxHashSet<AppPath> = self
            .assets
            .iter()
            .filter_map(Asset::as_leaf)
            .map(|leaf| leaf.path().clone())
            .collect();
        let bundle_path = self.path.clone();
        let scope = BundleScope {
            path: &bundle_path,
            members: &members,
        };

        let mut errors = Vec::new();
        for leaf in self.assets.iter_mut().filter_map(Asset::as_leaf_mut) {
            let source = leaf
                .read_source()
                .map_err(|e| BuildError::io(leaf.path(), e))?;
            for raw in scan_references(leaf.path(), &source) {
                match classify_reference(&raw.target, leaf.path(), &scope) {
                    Ok(target) => leaf.add_reference(target, Some(raw.line)),
                    Err(ClassifyError::Missing(target)) => errors.push(AssetReferenceError::new(
                        leaf.path().as_str(),
                        target.as_str(),
                        Some(raw.line),
                    )),
                    Err(ClassifyError::Path(e)) => {
                        return Err(BuildError::path(leaf.path(), Some(raw.line), e));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(BuildError::References(errors))
        }
    }

    /// Record relative stylesheet `url()` targets as raw-file references.
    pub fn add_css_url_references(&mut self) -> Result<(), BuildError> {
        for leaf in self.assets.iter_mut().filter_map(Asset::as_leaf_mut) {
            if !BundleKind::Stylesheet.accepts(leaf.path()) {
                continue;
            }
            let source = leaf
                .read_source()
                .map_err(|e| BuildError::io(leaf.path(), e))?;
            for raw in scan_css_urls(&source) {
                if raw.target.starts_with('/') {
                    continue;
                }
                match classify_raw_file(&raw.target, leaf.path()) {
                    Ok(target) => leaf.add_reference(target, Some(raw.line)),
                    Err(e) => {
                        crate::debug!("bundle"; "skipping url `{}` in {}: {}", raw.target, leaf.path(), e)
                    }
                }
            }
        }
        Ok(())
    }

    /// Order assets so same-bundle dependencies come first.
    pub fn sort_assets_by_dependency(&mut self) -> Result<(), BuildError> {
        if self.has_sorted_assets() {
            return Ok(());
        }

        let index: FxHashMap<&AppPath, usize> = self
            .assets
            .iter()
            .enumerate()
            .map(|(i, asset)| (asset.path(), i))
            .collect();
        let edges: Vec<Vec<usize>> = self
            .assets
            .iter()
            .map(|asset| {
                asset
                    .references()
                    .into_iter()
                    .filter_map(|r| match &r.target {
                        ReferenceTarget::SameBundle(target) => index.get(target).copied(),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        let graph = Graph::new(0..self.assets.len(), |&i| edges[i].clone());
        let order = graph.topological_sort().map_err(|cycles| BuildError::Cycles {
            subject: "asset",
            cycles: cycles
                .0
                .iter()
                .map(|cycle| cycle.iter().map(|&i| self.assets[i].path().to_string()).collect())
                .collect(),
        })?;

        let mut slots: Vec<Option<Asset>> = std::mem::take(&mut self.assets)
            .into_iter()
            .map(Some)
            .collect();
        self.assets = order.into_iter().filter_map(|i| slots[i].take()).collect();
        self.advance(BundleState::Sorted);
        Ok(())
    }

    /// Join all assets into one. Zero or one asset is left as is.
    pub fn concatenate_assets(&mut self, separator: &str) -> Result<(), BuildError> {
        if self.assets.len() > 1 {
            let children = std::mem::take(&mut self.assets);
            let joined = ConcatenatedAsset::new(self.path.clone(), children, separator.as_bytes())
                .map_err(|e| BuildError::io(&self.path, e))?;
            self.assets.push(Asset::Concatenated(joined));
        }
        self.advance(BundleState::Concatenated);
        Ok(())
    }

    /// Register a minifier on the single joined asset.
    pub fn minify(&mut self, minifier: SharedTransformer) {
        if let [asset] = self.assets.as_mut_slice() {
            asset.add_transformer(minifier);
            self.advance(BundleState::Minified);
        }
    }

    /// Run the bundle's pipeline.
    pub fn process(&mut self, settings: &ProcessSettings) -> Result<(), BuildError> {
        let pipeline = self.pipeline.clone();
        pipeline.run(self, settings)
    }

    /// Check whether `path` is this bundle, its URL, or one of its sources.
    pub fn contains_path(&self, path: &AppPath) -> bool {
        self.path == *path
            || self.path.is_within(path)
            || self
                .external_url
                .as_deref()
                .is_some_and(|url| AppPath::external(url) == *path)
            || self.assets.iter().any(|asset| asset.is_from(path))
    }

    /// First leaf asset with the given path.
    pub fn find_asset_by_path(&self, path: &AppPath) -> Option<&Asset> {
        let mut found = None;
        self.walk_assets(&mut |asset| {
            if found.is_none() && matches!(asset, Asset::Leaf(_)) && asset.path() == path {
                found = Some(asset);
            }
        });
        found
    }

    /// Content hash; defined only when the bundle holds exactly one asset.
    pub fn hash(&self) -> Option<ContentHash> {
        match self.assets.as_slice() {
            [asset] => asset.hash().ok(),
            _ => None,
        }
    }

    /// Visit leaf-level assets in order.
    pub fn walk_assets<'a>(&'a self, f: &mut dyn FnMut(&'a Asset)) {
        for asset in &self.assets {
            asset.walk(f);
        }
    }

    /// References of a given kind declared by the bundle's assets.
    pub fn asset_references(&self, kind: ReferenceKind) -> Vec<&ReferenceTarget> {
        self.assets
            .iter()
            .flat_map(Asset::references)
            .filter(|r| r.kind() == kind)
            .map(|r| &r.target)
            .collect()
    }

    /// Addresses to emit for this bundle.
    ///
    /// - external bundles: the URL itself
    /// - joined bundles: `<prefix>/<kind>/<hash>/<path>`
    /// - otherwise one `<prefix>/asset/<path>?<hash>` per leaf asset
    pub fn urls(&self, prefix: &str) -> Vec<String> {
        if let Some(url) = &self.external_url {
            return vec![url.clone()];
        }

        let prefix = prefix.trim_end_matches('/');
        if self.state >= BundleState::Concatenated
            && let Some(hash) = self.hash()
        {
            let mut relative = self.path.relative().to_string();
            if !self.kind.accepts(&self.path) {
                relative = format!("{relative}.{}", self.kind.output_extension());
            }
            return vec![format!("{prefix}/{}/{}/{}", self.kind.label(), hash.short(), relative)];
        }

        let mut urls = Vec::new();
        self.walk_assets(&mut |asset| {
            let version = asset.hash().map(|h| format!("?{}", h.short())).unwrap_or_default();
            urls.push(format!("{prefix}/asset/{}{}", asset.path().relative(), version));
        });
        urls
    }

    fn advance(&mut self, state: BundleState) {
        self.state = self.state.max(state);
    }
}

impl std::fmt::Debug for Bundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bundle")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("assets", &self.assets)
            .finish()
    }
}
