//! `refs` command: urls to include for a set of paths.

use anyhow::{Result, bail};

use super::common::build_service;
use crate::config::SatchelConfig;
use crate::core::AppPath;

pub fn refs(config: &SatchelConfig, paths: &[String]) -> Result<()> {
    let wanted = paths
        .iter()
        .map(|raw| raw.parse::<AppPath>())
        .collect::<Result<Vec<_>, _>>()?;

    let service = build_service(config);
    service.initialize()?;
    let Some(container) = service.snapshot() else {
        bail!("no bundles were built");
    };

    for path in &wanted {
        if let Some((bundle, asset)) = container.find_asset(path) {
            crate::debug!("bundle"; "{} is part of {}", asset.path(), bundle.path());
        }
    }

    for bundle in container.resolve(&wanted)? {
        for url in bundle.urls(&config.build.url_prefix) {
            println!("{url}");
        }
    }
    Ok(())
}
