//! Minification of concatenated bundles.
//!
//! Uses oxc for JavaScript and lightningcss for CSS. Content that fails to
//! parse is passed through unchanged.

use std::sync::Arc;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use super::BundleKind;
use crate::asset::transform::map_text;
use crate::asset::{OpenStream, Transformer};
use crate::core::AppPath;

/// Minify JavaScript source code.
///
/// Parsed as a classic script so top-level names stay global.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Minify content of the given bundle kind.
///
/// Returns `None` for kinds without a minifier or on parse failure.
pub fn minify_by_kind(kind: BundleKind, content: &str) -> Option<String> {
    match kind {
        BundleKind::Script => minify_js(content),
        BundleKind::Stylesheet => minify_css(content),
        BundleKind::HtmlTemplate => None,
    }
}

/// Transformer minifying the stream of a bundle's single asset.
pub struct Minify {
    kind: BundleKind,
}

impl Minify {
    pub fn new(kind: BundleKind) -> Arc<Self> {
        Arc::new(Self { kind })
    }
}

impl Transformer for Minify {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn transform(&self, open: OpenStream, asset: &AppPath) -> OpenStream {
        let kind = self.kind;
        let asset = asset.clone();
        map_text(open, move |text| match minify_by_kind(kind, &text) {
            Some(minified) => minified,
            None => {
                crate::debug!("minify"; "kept {} unminified", asset);
                text
            }
        })
    }
}
