//! Processing pipelines.
//!
//! A pipeline is an ordered list of [`Step`]s chosen by bundle kind and
//! overridable per bundle in the configuration.

use serde::{Deserialize, Serialize};

use super::css::ExpandCssUrls;
use super::minify::Minify;
use super::template::WrapHtmlTemplate;
use super::{Bundle, BundleKind};
use crate::error::BuildError;

/// Separator placed between concatenated assets.
pub const DEFAULT_SEPARATOR: &str = "\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Scan each asset for references and classify them.
    ParseReferences,
    /// Rewrite relative stylesheet urls (also records them as raw files).
    ExpandCssUrls,
    /// Wrap templates in script elements.
    WrapHtmlTemplate,
    /// Order assets by their same-bundle references.
    Sort,
    /// Join all assets into one (optimized builds only).
    Concatenate,
    /// Minify the joined asset (optimized builds with minify only).
    Minify,
}

/// Flags that decide which steps actually run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub optimize: bool,
    pub minify: bool,
    pub separator: String,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            optimize: true,
            minify: true,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Default steps for a bundle kind.
    pub fn for_kind(kind: BundleKind) -> Self {
        let steps = match kind {
            BundleKind::Script => vec![
                Step::ParseReferences,
                Step::Sort,
                Step::Concatenate,
                Step::Minify,
            ],
            BundleKind::Stylesheet => vec![
                Step::ParseReferences,
                Step::ExpandCssUrls,
                Step::Sort,
                Step::Concatenate,
                Step::Minify,
            ],
            BundleKind::HtmlTemplate => vec![
                Step::ParseReferences,
                Step::WrapHtmlTemplate,
                Step::Sort,
                Step::Concatenate,
            ],
        };
        Self { steps }
    }

    /// Steps that validate references without producing output.
    pub fn check_only() -> Self {
        Self::new(vec![Step::ParseReferences, Step::Sort])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn run(&self, bundle: &mut Bundle, settings: &ProcessSettings) -> Result<(), BuildError> {
        for step in &self.steps {
            match step {
                Step::ParseReferences => bundle.parse_references()?,
                Step::ExpandCssUrls => {
                    bundle.add_css_url_references()?;
                    bundle.add_transformer(ExpandCssUrls::new());
                }
                Step::WrapHtmlTemplate => {
                    bundle.add_transformer(WrapHtmlTemplate::new(bundle.path().clone()));
                }
                Step::Sort => bundle.sort_assets_by_dependency()?,
                Step::Concatenate if settings.optimize => {
                    bundle.concatenate_assets(&settings.separator)?;
                }
                Step::Minify if settings.optimize && settings.minify => {
                    bundle.minify(Minify::new(bundle.kind()));
                }
                Step::Concatenate | Step::Minify => {}
            }
        }
        Ok(())
    }
}
