//! Discovered source tree: what each bundle is made of.

use std::collections::BTreeMap;

use crate::asset::Asset;
use crate::bundle::{Bundle, BundleReference};
use crate::core::AppPath;

/// Bundle path -> composition, computed without reading contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTree {
    bundles: BTreeMap<AppPath, SourceEntry>,
}

/// Asset sources and bundle-level references of one bundle.
///
/// Pre-sorted bundles keep their asset order; others are compared as sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SourceEntry {
    pre_sorted: bool,
    assets: Vec<AppPath>,
    references: Vec<BundleReference>,
}

impl SourceTree {
    /// Snapshot the local bundles of a discovery result.
    pub fn from_bundles(bundles: &[Bundle]) -> Self {
        let mut tree = Self::default();
        for bundle in bundles.iter().filter(|b| !b.is_external()) {
            let mut assets = Vec::new();
            bundle.walk_assets(&mut |asset| match asset {
                Asset::Cached(cached) => assets.extend(cached.sources().iter().cloned()),
                _ => assets.push(asset.path().clone()),
            });
            tree.insert(
                bundle.path().clone(),
                assets,
                bundle.is_pre_sorted(),
                bundle.references().iter().cloned(),
            );
        }
        tree
    }

    pub fn insert(
        &mut self,
        bundle: AppPath,
        assets: impl IntoIterator<Item = AppPath>,
        pre_sorted: bool,
        references: impl IntoIterator<Item = BundleReference>,
    ) {
        let mut assets: Vec<AppPath> = assets.into_iter().collect();
        if !pre_sorted {
            assets.sort();
            assets.dedup();
        }
        self.bundles.insert(
            bundle,
            SourceEntry {
                pre_sorted,
                assets,
                references: references.into_iter().collect(),
            },
        );
    }

    /// Human-readable difference against `other`, for debug output.
    pub fn describe_difference(&self, other: &SourceTree) -> Option<String> {
        for (bundle, recorded) in &self.bundles {
            let Some(current) = other.bundles.get(bundle) else {
                return Some(format!("bundle {bundle} removed"));
            };
            if current.pre_sorted != recorded.pre_sorted || current.assets != recorded.assets {
                return Some(format!("assets of {bundle} changed"));
            }
            if current.references != recorded.references {
                return Some(format!("references of {bundle} changed"));
            }
        }
        other
            .bundles
            .keys()
            .find(|bundle| !self.bundles.contains_key(*bundle))
            .map(|bundle| format!("bundle {bundle} added"))
    }
}
