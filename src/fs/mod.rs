//! File system provider.
//!
//! Asset discovery and reading go through [`FileSystem`] so the bundler can run
//! against the real disk or an in-memory tree:
//! - `DiskFileSystem` - files under a root directory
//! - `MemoryFileSystem` - in-memory tree with explicit timestamps (tests)

mod disk;
#[cfg(test)]
mod memory;

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::AppPath;

pub use disk::DiskFileSystem;
#[cfg(test)]
pub use memory::MemoryFileSystem;

/// Readable stream handed out by [`FileSystem::open`].
pub type Stream = Box<dyn Read + Send>;

/// Shared handle used by assets and the build service.
pub type SharedFileSystem = Arc<dyn FileSystem>;

/// Abstract file system addressed by application-relative paths.
pub trait FileSystem: Send + Sync {
    /// Check if a regular file exists.
    fn exists(&self, path: &AppPath) -> bool;

    /// Check if a directory exists.
    fn is_dir(&self, path: &AppPath) -> bool;

    /// Open a file for reading.
    fn open(&self, path: &AppPath) -> io::Result<Stream>;

    /// Last modification time of a file.
    fn modified(&self, path: &AppPath) -> io::Result<SystemTime>;

    /// Files under `dir`, sorted by path. Direct children only unless `recursive`.
    fn list_files(&self, dir: &AppPath, recursive: bool) -> io::Result<Vec<AppPath>>;

    /// Direct child directories of `dir`, sorted by path.
    fn list_dirs(&self, dir: &AppPath) -> io::Result<Vec<AppPath>>;

    /// Read a whole file.
    fn read(&self, path: &AppPath) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Milliseconds since the Unix epoch (0 for pre-epoch times).
pub fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn not_found(path: &AppPath) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("file not found: {path}"))
}
