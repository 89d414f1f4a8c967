//! Build error types.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::core::PathError;

/// A reference whose target cannot be found.
///
/// Display format is stable and relied on by tooling:
/// `Reference error in "<source>", line <n>. Cannot find "<target>".`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReferenceError {
    pub asset: String,
    pub target: String,
    pub line: Option<u32>,
}

impl AssetReferenceError {
    pub fn new(asset: impl Into<String>, target: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            asset: asset.into(),
            target: target.into(),
            line,
        }
    }
}

impl fmt::Display for AssetReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "Reference error in \"{}\", line {}. Cannot find \"{}\".",
                self.asset, line, self.target
            ),
            None => write!(
                f,
                "Reference error in \"{}\". Cannot find \"{}\".",
                self.asset, self.target
            ),
        }
    }
}

impl std::error::Error for AssetReferenceError {}

/// Errors raised while discovering, processing or linking bundles.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{}", join_lines(.0))]
    References(Vec<AssetReferenceError>),

    #[error("cycles detected in {subject} references:\n{}", format_cycles(.cycles))]
    Cycles {
        subject: &'static str,
        cycles: Vec<Vec<String>>,
    },

    #[error("invalid path in \"{origin}\"{}: {error}", format_line(.line))]
    Path {
        origin: String,
        line: Option<u32>,
        #[source]
        error: PathError,
    },

    #[error("bundle asset not found \"{path}\" (bundle \"{bundle}\")")]
    MissingFile { bundle: String, path: String },

    #[error("invalid bundle definition: {0}")]
    Definition(String),

    #[error("IO error when reading `{path}`")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl BuildError {
    pub fn io(path: impl fmt::Display, source: io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn path(origin: impl fmt::Display, line: Option<u32>, error: PathError) -> Self {
        Self::Path {
            origin: origin.to_string(),
            line,
            error,
        }
    }
}

fn join_lines(errors: &[AssetReferenceError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| format!("[{}]", cycle.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_line(line: &Option<u32>) -> String {
    line.map(|n| format!(", line {n}")).unwrap_or_default()
}
