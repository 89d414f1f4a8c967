//! Wiring shared by the CLI commands.

use std::sync::Arc;

use crate::cache::ManifestCache;
use crate::config::SatchelConfig;
use crate::fs::{DiskFileSystem, SharedFileSystem};
use crate::service::BuildService;

pub fn file_system(config: &SatchelConfig) -> SharedFileSystem {
    Arc::new(DiskFileSystem::new(config.source_dir()))
}

pub fn manifest_cache(config: &SatchelConfig) -> ManifestCache {
    ManifestCache::new(config.cache_dir())
}

pub fn build_service(config: &SatchelConfig) -> BuildService {
    BuildService::new(
        config.build_settings(),
        file_system(config),
        manifest_cache(config),
    )
}

/// `1 bundle`, `3 bundles`
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
