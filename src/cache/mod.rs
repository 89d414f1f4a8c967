//! Manifest cache: persisted build snapshots for fast startup.
//!
//! When the manifest still describes the sources, bundles are restored
//! from cached content files instead of being parsed, sorted and joined.

mod manifest;
mod restore;
mod store;
mod tree;

pub use manifest::{AssetManifest, BundleManifest, FileStamp, MANIFEST_FILE, Manifest, ReferenceManifest};
pub use restore::restore;
pub use store::ManifestCache;
pub use tree::SourceTree;
