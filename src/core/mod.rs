//! Core types shared across the codebase.

mod hash;
mod path;
mod state;

pub use hash::ContentHash;
pub use path::{AppPath, PathError, is_url};
pub use state::{is_shutdown, setup_shutdown_handler};
