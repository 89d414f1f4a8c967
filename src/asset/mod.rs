//! Assets: the units that bundles order and join.
//!
//! An [`Asset`] is one of:
//! - `Leaf` - a single source file read through the file system provider
//! - `Concatenated` - several assets joined into one buffer
//! - `Cached` - content restored from the manifest cache, loaded lazily
//!
//! Transformers registered on an asset apply on every `open`, never to
//! the hash or to reference parsing.

pub mod parse;
mod reference;
pub mod transform;

use std::io::{self, Cursor, Read};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use crate::core::{AppPath, ContentHash};
use crate::fs::{SharedFileSystem, Stream};

pub use reference::{
    AssetReference, BundleScope, ClassifyError, ReferenceKind, ReferenceTarget,
    classify_raw_file, classify_reference,
};
pub use transform::{OpenStream, SharedTransformer, Transformer};

// ============================================================================
// Leaf
// ============================================================================

/// A single source file.
pub struct FileAsset {
    path: AppPath,
    fs: SharedFileSystem,
    hash: OnceLock<ContentHash>,
    references: Vec<AssetReference>,
    transformers: Vec<SharedTransformer>,
}

impl FileAsset {
    pub fn new(path: AppPath, fs: SharedFileSystem) -> Self {
        Self {
            path,
            fs,
            hash: OnceLock::new(),
            references: Vec::new(),
            transformers: Vec::new(),
        }
    }

    #[inline]
    pub fn path(&self) -> &AppPath {
        &self.path
    }

    pub fn references(&self) -> &[AssetReference] {
        &self.references
    }

    /// Record a classified reference. Raw-file references are deduplicated.
    pub fn add_reference(&mut self, target: ReferenceTarget, line: Option<u32>) {
        if matches!(target, ReferenceTarget::RawFile(_))
            && self.references.iter().any(|r| r.target == target)
        {
            return;
        }
        self.references
            .push(AssetReference::new(self.path.clone(), target, line));
    }

    /// Untransformed source text. Invalid UTF-8 is replaced, not rejected.
    pub fn read_source(&self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.fs.open(&self.path)?.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Content hash of the untransformed file, computed once.
    pub fn hash(&self) -> io::Result<ContentHash> {
        if let Some(hash) = self.hash.get() {
            return Ok(*hash);
        }
        let hash = ContentHash::from_reader(self.fs.open(&self.path)?)?;
        Ok(*self.hash.get_or_init(|| hash))
    }

    pub fn modified(&self) -> io::Result<SystemTime> {
        self.fs.modified(&self.path)
    }

    fn open_source(&self) -> OpenStream {
        let fs = Arc::clone(&self.fs);
        let path = self.path.clone();
        Box::new(move || fs.open(&path))
    }
}

// ============================================================================
// Concatenated
// ============================================================================

/// Children joined into one buffer; keeps the children for traversal.
pub struct ConcatenatedAsset {
    path: AppPath,
    children: Vec<Asset>,
    content: Arc<[u8]>,
    hash: ContentHash,
    transformers: Vec<SharedTransformer>,
}

impl ConcatenatedAsset {
    /// Join the (transformed) bytes of `children` with `separator`.
    pub fn new(path: AppPath, children: Vec<Asset>, separator: &[u8]) -> io::Result<Self> {
        let mut content = Vec::new();
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                content.extend_from_slice(separator);
            }
            content.extend(child.read()?);
        }

        Ok(Self {
            path,
            children,
            hash: ContentHash::of(&content),
            content: Arc::from(content),
            transformers: Vec::new(),
        })
    }

    pub fn children(&self) -> &[Asset] {
        &self.children
    }
}

// ============================================================================
// Cached
// ============================================================================

/// Produces the content of a cached asset on demand.
pub type ContentLoader = Arc<dyn Fn() -> io::Result<Stream> + Send + Sync>;

/// Asset restored from the manifest cache.
pub struct CachedAsset {
    path: AppPath,
    sources: Vec<AppPath>,
    hash: ContentHash,
    references: Vec<AssetReference>,
    load: ContentLoader,
    transformers: Vec<SharedTransformer>,
}

impl CachedAsset {
    pub fn new(
        path: AppPath,
        sources: Vec<AppPath>,
        hash: ContentHash,
        references: Vec<AssetReference>,
        load: ContentLoader,
    ) -> Self {
        Self {
            path,
            sources,
            hash,
            references,
            load,
            transformers: Vec::new(),
        }
    }

    /// Source files the cached content was built from.
    pub fn sources(&self) -> &[AppPath] {
        &self.sources
    }
}

// ============================================================================
// Asset
// ============================================================================

pub enum Asset {
    Leaf(FileAsset),
    Concatenated(ConcatenatedAsset),
    Cached(CachedAsset),
}

impl Asset {
    /// File path for leaves; owning bundle path for composite assets.
    pub fn path(&self) -> &AppPath {
        match self {
            Self::Leaf(leaf) => &leaf.path,
            Self::Concatenated(asset) => &asset.path,
            Self::Cached(asset) => &asset.path,
        }
    }

    /// Human-readable source name (`a.js;b.js` for composites).
    pub fn display_name(&self) -> String {
        match self {
            Self::Leaf(leaf) => leaf.path.to_string(),
            Self::Concatenated(asset) => asset
                .children
                .iter()
                .map(Asset::display_name)
                .collect::<Vec<_>>()
                .join(";"),
            Self::Cached(asset) => asset
                .sources
                .iter()
                .map(AppPath::as_str)
                .collect::<Vec<_>>()
                .join(";"),
        }
    }

    pub fn hash(&self) -> io::Result<ContentHash> {
        match self {
            Self::Leaf(leaf) => leaf.hash(),
            Self::Concatenated(asset) => Ok(asset.hash),
            Self::Cached(asset) => Ok(asset.hash),
        }
    }

    /// References of this asset, including those of concatenated children.
    pub fn references(&self) -> Vec<&AssetReference> {
        match self {
            Self::Leaf(leaf) => leaf.references.iter().collect(),
            Self::Concatenated(asset) => asset
                .children
                .iter()
                .flat_map(Asset::references)
                .collect(),
            Self::Cached(asset) => asset.references.iter().collect(),
        }
    }

    /// Open the content with every registered transformer applied.
    pub fn open(&self) -> io::Result<Stream> {
        let base: OpenStream = match self {
            Self::Leaf(leaf) => leaf.open_source(),
            Self::Concatenated(asset) => {
                let content = Arc::clone(&asset.content);
                Box::new(move || Ok(Box::new(Cursor::new(content)) as Stream))
            }
            Self::Cached(asset) => {
                let load = Arc::clone(&asset.load);
                Box::new(move || load())
            }
        };
        transform::apply(self.transformers(), base, self.path())()
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open()?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn transformers(&self) -> &[SharedTransformer] {
        match self {
            Self::Leaf(leaf) => &leaf.transformers,
            Self::Concatenated(asset) => &asset.transformers,
            Self::Cached(asset) => &asset.transformers,
        }
    }

    pub fn add_transformer(&mut self, transformer: SharedTransformer) {
        match self {
            Self::Leaf(leaf) => leaf.transformers.push(transformer),
            Self::Concatenated(asset) => asset.transformers.push(transformer),
            Self::Cached(asset) => asset.transformers.push(transformer),
        }
    }

    /// Check whether this asset was built from the source file `path`.
    pub fn is_from(&self, path: &AppPath) -> bool {
        match self {
            Self::Leaf(leaf) => leaf.path == *path,
            Self::Concatenated(asset) => asset.children.iter().any(|c| c.is_from(path)),
            Self::Cached(asset) => asset.sources.contains(path),
        }
    }

    /// Visit leaf-level assets (leaves and cached assets) in order.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Asset)) {
        match self {
            Self::Leaf(_) | Self::Cached(_) => f(self),
            Self::Concatenated(asset) => {
                for child in &asset.children {
                    child.walk(f);
                }
            }
        }
    }

    pub fn as_leaf(&self) -> Option<&FileAsset> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut FileAsset> {
        match self {
            Self::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Leaf(_) => "Leaf",
            Self::Concatenated(_) => "Concatenated",
            Self::Cached(_) => "Cached",
        };
        write!(f, "{variant}({})", self.display_name())
    }
}
