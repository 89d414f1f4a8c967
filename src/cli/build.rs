//! `build` and `clean` commands.

use anyhow::{Context, Result};

use super::common::{build_service, manifest_cache, plural};
use crate::config::SatchelConfig;
use crate::log;
use crate::service::BuildSource;

pub fn build(config: &SatchelConfig, force: bool) -> Result<()> {
    let service = build_service(config);
    if force {
        service
            .cache()
            .clear()
            .with_context(|| format!("failed to clear {}", service.cache().dir().display()))?;
    }

    let report = service.initialize()?;
    let source = match report.source {
        BuildSource::Cache => "restored from cache",
        BuildSource::Fresh => "built",
    };
    log!("build"; "{} {} in {:.2?}", plural(report.bundles, "bundle"), source, report.elapsed);

    if let Some(container) = service.snapshot() {
        for bundle in container.sorted() {
            for url in bundle.urls(&config.build.url_prefix) {
                crate::debug!("bundle"; "{} -> {}", bundle.path(), url);
            }
        }
    }
    Ok(())
}

pub fn clean(config: &SatchelConfig) -> Result<()> {
    let cache = manifest_cache(config);
    cache
        .clear()
        .with_context(|| format!("failed to remove {}", cache.dir().display()))?;
    log!("cache"; "removed {}", cache.dir().display());
    Ok(())
}
