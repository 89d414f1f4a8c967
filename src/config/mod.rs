//! Configuration for `satchel.toml`.
//!
//! | Section        | Purpose                                          |
//! |----------------|--------------------------------------------------|
//! | `[source]`     | Directory the `~/` root maps to                  |
//! | `[cache]`      | Manifest cache directory                         |
//! | `[build]`      | Version, optimize, minify, url prefix            |
//! | `[[bundles]]`  | Bundle definitions                               |

mod error;

pub use error::ConfigError;

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::bundle::{BundleDefinition, DEFAULT_SEPARATOR, ProcessSettings};
use crate::core::{AppPath, ContentHash};
use crate::log;
use crate::service::BuildSettings;

pub const CONFIG_FILE: &str = "satchel.toml";

// ============================================================================
// sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory mapped to `~/`, relative to the config file.
    pub dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".satchel"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Free-form application version; part of the cache version.
    pub version: String,
    /// Concatenate bundles and use the manifest cache.
    pub optimize: bool,
    /// Minify concatenated bundles (only with `optimize`).
    pub minify: bool,
    /// Prefix of generated bundle urls.
    pub url_prefix: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            optimize: true,
            minify: true,
            url_prefix: "/".to_string(),
        }
    }
}

// ============================================================================
// root configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SatchelConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory containing the config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub bundles: Vec<BundleDefinition>,
}

impl SatchelConfig {
    /// Find `name` upward from the working directory and load it.
    pub fn load(name: &Path) -> Result<Self, ConfigError> {
        let path = find_config_file(name).ok_or_else(|| ConfigError::NotFound(name.to_path_buf()))?;
        let mut config = Self::from_path(&path)?;
        config.root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.config_path = path;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "ignoring unknown fields in {}: {}", name, ignored.join(", "));
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bundles.is_empty() {
            return Err(ConfigError::Validation("no [[bundles]] defined".to_string()));
        }
        let mut seen = std::collections::BTreeSet::new();
        for definition in &self.bundles {
            let path = AppPath::normalize(&definition.path).map_err(|e| {
                ConfigError::Validation(format!("bundle path `{}`: {}", definition.path, e))
            })?;
            if !seen.insert(path.clone()) {
                return Err(ConfigError::Validation(format!(
                    "bundle `{path}` is defined more than once"
                )));
            }
        }
        if !self.build.url_prefix.starts_with('/') && !crate::core::is_url(&self.build.url_prefix) {
            return Err(ConfigError::Validation(format!(
                "build.url_prefix `{}` must start with `/` or be an absolute url",
                self.build.url_prefix
            )));
        }
        Ok(())
    }

    /// Directory mapped to `~/`.
    pub fn source_dir(&self) -> PathBuf {
        self.resolve(&self.source.dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.resolve(&self.cache.dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        self.root.join(expanded)
    }

    /// Fingerprint of everything that changes build output besides sources.
    pub fn cache_version(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(env!("CARGO_PKG_VERSION").as_bytes());
        hasher.update(b"\0");
        hasher.update(self.build.version.as_bytes());
        hasher.update(&[u8::from(self.build.optimize), u8::from(self.build.minify)]);
        for definition in &self.bundles {
            let json = serde_json::to_string(definition).unwrap_or_default();
            hasher.update(json.as_bytes());
            hasher.update(b"\0");
        }
        ContentHash::new(*hasher.finalize().as_bytes()).short()
    }

    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            optimize: self.build.optimize,
            minify: self.build.optimize && self.build.minify,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn build_settings(&self) -> BuildSettings {
        BuildSettings {
            definitions: self.bundles.clone(),
            process: self.process_settings(),
            version: self.cache_version(),
            url_prefix: self.build.url_prefix.clone(),
        }
    }
}

/// Walk up from the working directory until `name` is found.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    if name.is_absolute() {
        return name.exists().then(|| name.to_path_buf());
    }

    let cwd = std::env::current_dir().ok()?;
    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(name);
        if candidate.exists() {
            return Some(candidate);
        }
        current = current.parent()?;
    }
}
