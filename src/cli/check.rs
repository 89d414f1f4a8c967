//! `check` command: parse and order everything, join nothing.

use anyhow::Result;

use super::common::{file_system, plural};
use crate::bundle::{Pipeline, discover};
use crate::config::SatchelConfig;
use crate::container::BundleContainer;
use crate::log;

pub fn check(config: &SatchelConfig) -> Result<()> {
    let fs = file_system(config);
    let settings = config.process_settings();

    let mut bundles = discover(&config.bundles, &fs)?;
    let assets: usize = bundles.iter().map(|b| b.assets().len()).sum();
    for bundle in &mut bundles {
        bundle.set_pipeline(Pipeline::check_only());
        bundle.process(&settings)?;
    }
    let container = BundleContainer::new(bundles)?;

    log!(
        "check";
        "{} with {} ok",
        plural(container.len(), "bundle"),
        plural(assets, "asset")
    );
    Ok(())
}
