//! In-memory file system with explicit timestamps.

use std::collections::BTreeMap;
use std::io::{self, Cursor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use super::{FileSystem, Stream, not_found};
use crate::core::AppPath;

#[derive(Clone)]
struct MemoryFile {
    content: Arc<[u8]>,
    modified: SystemTime,
}

/// File tree held in memory, keyed case-insensitively.
#[derive(Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<AppPath, MemoryFile>>,
    opens: AtomicUsize,
}

impl MemoryFileSystem {
    /// Timestamp given to files inserted without one.
    pub const DEFAULT_MODIFIED: Duration = Duration::from_secs(1_000_000);

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for tests and fixtures.
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.insert_at(path, content, UNIX_EPOCH + Self::DEFAULT_MODIFIED);
    }

    /// Insert or replace a file with an explicit modification time.
    ///
    /// Invalid paths are ignored.
    pub fn insert_at(&self, path: &str, content: impl Into<Vec<u8>>, modified: SystemTime) {
        let Ok(path) = AppPath::normalize(path) else {
            return;
        };
        let file = MemoryFile {
            content: Arc::from(content.into()),
            modified,
        };
        self.files.write().insert(path, file);
    }

    /// Update a file's modification time. Returns false if missing.
    pub fn touch(&self, path: &str, modified: SystemTime) -> bool {
        let Ok(path) = AppPath::normalize(path) else {
            return false;
        };
        match self.files.write().get_mut(&path) {
            Some(file) => {
                file.modified = modified;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, path: &str) -> bool {
        AppPath::normalize(path)
            .ok()
            .is_some_and(|path| self.files.write().remove(&path).is_some())
    }

    /// Number of `open` calls served so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &AppPath) -> bool {
        self.files.read().contains_key(path)
    }

    fn is_dir(&self, path: &AppPath) -> bool {
        if path.is_root() {
            return true;
        }
        self.files.read().keys().any(|file| file.is_within(path))
    }

    fn open(&self, path: &AppPath) -> io::Result<Stream> {
        let content = self
            .files
            .read()
            .get(path)
            .map(|file| Arc::clone(&file.content))
            .ok_or_else(|| not_found(path))?;
        self.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(Cursor::new(content)))
    }

    fn modified(&self, path: &AppPath) -> io::Result<SystemTime> {
        self.files
            .read()
            .get(path)
            .map(|file| file.modified)
            .ok_or_else(|| not_found(path))
    }

    fn list_files(&self, dir: &AppPath, recursive: bool) -> io::Result<Vec<AppPath>> {
        if !self.is_dir(dir) {
            return Err(not_found(dir));
        }
        Ok(self
            .files
            .read()
            .keys()
            .filter(|file| file.is_within(dir) && (recursive || file.parent() == *dir))
            .cloned()
            .collect())
    }

    fn list_dirs(&self, dir: &AppPath) -> io::Result<Vec<AppPath>> {
        let mut dirs: Vec<AppPath> = self
            .files
            .read()
            .keys()
            .filter_map(|file| {
                let rest = file.strip_dir(dir)?;
                let (child, _) = rest.split_once('/')?;
                dir.join(child).ok()
            })
            .collect();
        dirs.sort();
        dirs.dedup();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> AppPath {
        AppPath::normalize(raw).unwrap()
    }

    #[test]
    fn test_listing() {
        let fs = MemoryFileSystem::new()
            .with_file("~/app/b.js", "b")
            .with_file("~/app/a.js", "a")
            .with_file("~/app/lib/c.js", "c")
            .with_file("~/other.js", "o");

        assert_eq!(
            fs.list_files(&p("~/app"), false).unwrap(),
            vec![p("~/app/a.js"), p("~/app/b.js")]
        );
        assert_eq!(fs.list_files(&p("~/app"), true).unwrap().len(), 3);
        assert_eq!(fs.list_dirs(&p("~/app")).unwrap(), vec![p("~/app/lib")]);
        assert!(fs.is_dir(&p("~/APP")));
        assert!(!fs.is_dir(&p("~/app/a.js")));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let fs = MemoryFileSystem::new().with_file("~/App/Main.js", "x");
        assert!(fs.exists(&p("~/app/main.JS")));
        assert_eq!(fs.read(&p("~/APP/MAIN.js")).unwrap(), b"x");
        assert_eq!(fs.open_count(), 1);
    }

    #[test]
    fn test_touch_and_remove() {
        let fs = MemoryFileSystem::new().with_file("~/a.js", "a");
        let later = UNIX_EPOCH + Duration::from_secs(5_000_000);
        assert!(fs.touch("~/a.js", later));
        assert_eq!(fs.modified(&p("~/a.js")).unwrap(), later);
        assert!(fs.remove("~/a.js"));
        assert!(fs.modified(&p("~/a.js")).is_err());
        assert!(!fs.touch("~/a.js", later));
    }
}
