//! Command-line interface module.

mod args;
pub mod build;
pub mod check;
mod common;
pub mod refs;
pub mod watch;

pub use args::{Cli, Commands};
