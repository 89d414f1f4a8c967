//! Disk-backed file system rooted at the asset source directory.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use jwalk::WalkDir;

use super::{FileSystem, Stream};
use crate::core::AppPath;

/// Maps `~/a/b.js` to `<root>/a/b.js`.
#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    root: PathBuf,
}

impl DiskFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of an application path.
    pub fn resolve(&self, path: &AppPath) -> PathBuf {
        self.root.join(path.relative())
    }

    /// Application path of an absolute location, if under the root.
    pub fn app_path(&self, path: &Path) -> Option<AppPath> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        AppPath::normalize(&relative).ok()
    }
}

impl FileSystem for DiskFileSystem {
    fn exists(&self, path: &AppPath) -> bool {
        !path.is_external() && self.resolve(path).is_file()
    }

    fn is_dir(&self, path: &AppPath) -> bool {
        !path.is_external() && self.resolve(path).is_dir()
    }

    fn open(&self, path: &AppPath) -> io::Result<Stream> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(BufReader::with_capacity(64 * 1024, file)))
    }

    fn modified(&self, path: &AppPath) -> io::Result<SystemTime> {
        fs::metadata(self.resolve(path))?.modified()
    }

    fn list_files(&self, dir: &AppPath, recursive: bool) -> io::Result<Vec<AppPath>> {
        let base = self.resolve(dir);
        if !base.is_dir() {
            return Err(super::not_found(dir));
        }

        let depth = if recursive { usize::MAX } else { 1 };
        let mut files: Vec<AppPath> = WalkDir::new(&base)
            .max_depth(depth)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.app_path(&e.path()))
            .collect();
        files.sort();
        Ok(files)
    }

    fn list_dirs(&self, dir: &AppPath) -> io::Result<Vec<AppPath>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(self.resolve(dir))? {
            let entry = entry?;
            if entry.file_type()?.is_dir()
                && let Some(path) = self.app_path(&entry.path())
            {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn p(raw: &str) -> AppPath {
        AppPath::normalize(raw).unwrap()
    }

    fn setup() -> (TempDir, DiskFileSystem) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("scripts/lib")).unwrap();
        fs::write(dir.path().join("scripts/b.js"), "b").unwrap();
        fs::write(dir.path().join("scripts/a.js"), "a").unwrap();
        fs::write(dir.path().join("scripts/lib/c.js"), "c").unwrap();
        let fs = DiskFileSystem::new(dir.path());
        (dir, fs)
    }

    #[test]
    fn test_list_files_sorted() {
        let (_dir, fs) = setup();
        let direct = fs.list_files(&p("~/scripts"), false).unwrap();
        assert_eq!(direct, vec![p("~/scripts/a.js"), p("~/scripts/b.js")]);

        let all = fs.list_files(&p("~/scripts"), true).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.contains(&p("~/scripts/lib/c.js")));
    }

    #[test]
    fn test_exists_and_open() {
        let (_dir, fs) = setup();
        assert!(fs.exists(&p("~/scripts/a.js")));
        assert!(!fs.exists(&p("~/scripts")));
        assert!(fs.is_dir(&p("~/scripts")));

        let mut content = String::new();
        fs.open(&p("~/scripts/a.js"))
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "a");
    }

    #[test]
    fn test_list_dirs() {
        let (_dir, fs) = setup();
        assert_eq!(fs.list_dirs(&p("~/scripts")).unwrap(), vec![p("~/scripts/lib")]);
    }

    #[test]
    fn test_missing_dir_is_error() {
        let (_dir, fs) = setup();
        assert!(fs.list_files(&p("~/nope"), true).is_err());
    }
}
