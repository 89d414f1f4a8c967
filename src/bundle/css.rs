//! Stylesheet url rewriting.

use std::sync::Arc;

use regex::Captures;

use crate::asset::parse::{CSS_URL, is_relative_url};
use crate::asset::transform::map_text;
use crate::asset::{OpenStream, Transformer};
use crate::core::AppPath;

/// Rewrites relative `url(...)` targets to application-root absolute ones,
/// so they keep working once the stylesheet is served from the bundle URL.
pub struct ExpandCssUrls;

impl ExpandCssUrls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Transformer for ExpandCssUrls {
    fn name(&self) -> &'static str {
        "expand-css-urls"
    }

    fn transform(&self, open: OpenStream, asset: &AppPath) -> OpenStream {
        let asset = asset.clone();
        map_text(open, move |text| expand_urls(&text, &asset))
    }
}

/// Rewrite every relative `url()` in `css` as seen from `asset`.
pub fn expand_urls(css: &str, asset: &AppPath) -> String {
    CSS_URL
        .replace_all(css, |caps: &Captures<'_>| {
            let target = caps[2].trim();
            if !is_relative_url(target) || target.starts_with('/') {
                return caps[0].to_string();
            }

            let end = target.find(['?', '#']).unwrap_or(target.len());
            let (path, suffix) = target.split_at(end);
            match AppPath::combine(asset, path) {
                Ok(resolved) => format!(
                    "url({}/{}{}{})",
                    &caps[1],
                    resolved.relative(),
                    suffix,
                    &caps[3]
                ),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}
