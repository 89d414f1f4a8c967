//! Event debouncing for watch mode.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

pub const DEBOUNCE_MS: u64 = 300;
pub const REBUILD_COOLDOWN_MS: u64 = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Timing and dedup of raw notify events. Knows nothing about bundles.
pub struct Debouncer {
    /// Path → ChangeKind (dedup via map key)
    changes: FxHashMap<PathBuf, ChangeKind>,
    /// Directories whose events are dropped (the cache directory).
    ignored: Vec<PathBuf>,
    last_event: Option<Instant>,
    last_rebuild: Option<Instant>,
}

impl Debouncer {
    pub fn new(ignored: Vec<PathBuf>) -> Self {
        Self {
            changes: FxHashMap::default(),
            ignored,
            last_event: None,
            last_rebuild: None,
        }
    }

    /// Add a notify event:
    /// - Removed then Created/Modified → the new kind (file restored)
    /// - Modified then Removed → Removed
    /// - Created then Removed → dropped
    /// - otherwise the first event wins
    pub fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // mtime/chmod noise would loop rebuilds
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) || self.is_ignored(path) {
                continue;
            }

            if let Some(&existing) = self.changes.get(path) {
                match (existing, kind) {
                    (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
                        crate::debug!("watch"; "restored: {}", path.display());
                        self.changes.insert(path.clone(), kind);
                    }
                    (ChangeKind::Modified, ChangeKind::Removed) => {
                        self.changes.insert(path.clone(), ChangeKind::Removed);
                    }
                    (ChangeKind::Created, ChangeKind::Removed) => {
                        crate::debug!("watch"; "discard created+removed: {}", path.display());
                        self.changes.remove(path);
                    }
                    _ => continue,
                }
                self.last_event = Some(Instant::now());
                continue;
            }

            crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.changes.insert(path.clone(), kind);
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the pending changes once debounce and cooldown have elapsed.
    pub fn take_if_ready(&mut self) -> Option<Vec<(PathBuf, ChangeKind)>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;
        self.last_rebuild = Some(Instant::now());

        let mut changes: Vec<_> = changes.into_iter().collect();
        changes.sort();
        Some(changes)
    }

    pub fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        if let Some(last_rebuild) = self.last_rebuild
            && last_rebuild.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Sleep until the next moment `is_ready` could flip.
    pub fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());

        let cooldown_remaining = self
            .last_rebuild
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.iter().any(|dir| path.starts_with(dir))
    }
}

/// Editor artifacts and hidden files.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.into_iter().map(PathBuf::from).collect(),
            attrs: Default::default(),
        }
    }

    fn modify_kind() -> notify::EventKind {
        notify::EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Any,
        ))
    }

    fn create_kind() -> notify::EventKind {
        notify::EventKind::Create(notify::event::CreateKind::File)
    }

    fn remove_kind() -> notify::EventKind {
        notify::EventKind::Remove(notify::event::RemoveKind::File)
    }

    #[test]
    fn test_debouncer_empty() {
        let debouncer = Debouncer::new(Vec::new());
        assert!(!debouncer.is_ready());
        assert!(debouncer.sleep_duration() >= Duration::from_secs(3600));
    }

    #[test]
    fn test_dedup_first_event_wins() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.add_event(&make_event(vec!["/src/a.js"], create_kind()));
        debouncer.add_event(&make_event(vec!["/src/a.js"], modify_kind()));

        assert_eq!(debouncer.changes.len(), 1);
        assert_eq!(debouncer.changes[&PathBuf::from("/src/a.js")], ChangeKind::Created);
    }

    #[test]
    fn test_remove_then_create_restores() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.add_event(&make_event(vec!["/src/a.js"], remove_kind()));
        debouncer.add_event(&make_event(vec!["/src/a.js"], create_kind()));
        assert_eq!(debouncer.changes[&PathBuf::from("/src/a.js")], ChangeKind::Created);
    }

    #[test]
    fn test_modify_then_remove_upgrades() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.add_event(&make_event(vec!["/src/a.js"], modify_kind()));
        debouncer.add_event(&make_event(vec!["/src/a.js"], remove_kind()));
        assert_eq!(debouncer.changes[&PathBuf::from("/src/a.js")], ChangeKind::Removed);
    }

    #[test]
    fn test_create_then_remove_discards() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.add_event(&make_event(vec!["/src/a.js"], create_kind()));
        debouncer.add_event(&make_event(vec!["/src/a.js"], remove_kind()));
        assert!(debouncer.changes.is_empty());
    }

    #[test]
    fn test_ignored_and_temp_files() {
        let mut debouncer = Debouncer::new(vec![PathBuf::from("/src/.satchel")]);
        debouncer.add_event(&make_event(
            vec!["/src/.satchel/manifest.json", "/src/a.js.swp", "/src/a.js~", "/src/b.css"],
            modify_kind(),
        ));
        assert_eq!(debouncer.changes.len(), 1);
        assert!(debouncer.changes.contains_key(&PathBuf::from("/src/b.css")));
    }

    #[test]
    fn test_metadata_changes_ignored() {
        let mut debouncer = Debouncer::new(Vec::new());
        let kind = notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
            notify::event::MetadataKind::WriteTime,
        ));
        debouncer.add_event(&make_event(vec!["/src/a.js"], kind));
        assert!(debouncer.changes.is_empty());
        assert!(debouncer.last_event.is_none());
    }

    #[test]
    fn test_take_if_ready_after_debounce() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.add_event(&make_event(vec!["/src/a.js"], modify_kind()));
        assert!(debouncer.take_if_ready().is_none());

        debouncer.last_event = Some(Instant::now() - Duration::from_millis(DEBOUNCE_MS + 50));
        let changes = debouncer.take_if_ready().unwrap();
        assert_eq!(changes, vec![(PathBuf::from("/src/a.js"), ChangeKind::Modified)]);
        assert!(debouncer.changes.is_empty());
        assert!(debouncer.last_rebuild.is_some());
    }

    #[test]
    fn test_sleep_duration_respects_cooldown() {
        let mut debouncer = Debouncer::new(Vec::new());
        debouncer.last_event = Some(Instant::now());
        debouncer.last_rebuild = Some(Instant::now());

        let dur = debouncer.sleep_duration();
        assert!(dur >= Duration::from_millis(REBUILD_COOLDOWN_MS - 10));
        assert!(dur <= Duration::from_millis(REBUILD_COOLDOWN_MS + 10));
    }
}
