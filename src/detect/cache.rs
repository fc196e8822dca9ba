// src/detect/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use tracing::debug;

use crate::detect::stamp::FileStamp;
use crate::tasks::lint::LintDiagnostic;

/// What a task remembers about one input file.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub stamp: FileStamp,
    /// Lint results produced when the file was last processed.
    pub diagnostics: Vec<LintDiagnostic>,
}

/// Per-task memory of processed inputs for one build session.
///
/// Entries are scoped by task (or fan-out unit) name so two tasks that read
/// the same file do not see each other's results. Nothing is persisted:
/// a new process starts empty and `clean` clears everything.
///
/// The cache is shared between concurrently running tasks, hence the
/// internal lock.
#[derive(Debug, Default)]
pub struct IncrementalCache {
    scopes: Mutex<HashMap<String, HashMap<PathBuf, CacheEntry>>>,
}

impl IncrementalCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HashMap<PathBuf, CacheEntry>>> {
        // A panic inside a task must not poison the whole session.
        self.scopes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the remembered entry for `path` if the file is unchanged
    /// since it was recorded.
    pub fn lookup_unchanged(&self, scope: &str, path: &Path) -> Result<Option<CacheEntry>> {
        let entry = self
            .lock()
            .get(scope)
            .and_then(|entries| entries.get(path))
            .cloned();

        match entry {
            Some(entry) if entry.stamp.matches(path)? => Ok(Some(entry)),
            Some(_) => {
                debug!(scope, path = ?path, "cache entry is stale");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn record(&self, scope: &str, path: &Path, entry: CacheEntry) {
        self.lock()
            .entry(scope.to_string())
            .or_default()
            .insert(path.to_path_buf(), entry);
    }

    /// Drop entries in `scope` for files no longer part of it.
    pub fn retain(&self, scope: &str, keep: &[PathBuf]) {
        if let Some(entries) = self.lock().get_mut(scope) {
            entries.retain(|path, _| keep.contains(path));
        }
    }

    /// Invalidate everything (used by `clean`).
    pub fn clear(&self) {
        let mut scopes = self.lock();
        let count: usize = scopes.values().map(HashMap::len).sum();
        scopes.clear();
        debug!(entries = count, "incremental cache cleared");
    }

    /// Number of entries across all scopes.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn entry_for(path: &Path) -> CacheEntry {
        CacheEntry {
            stamp: FileStamp::read(path).unwrap(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn scopes_are_isolated_and_clear_wipes_all() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.js");
        fs::write(&f, "var a;").unwrap();

        let cache = IncrementalCache::new();
        cache.record("lint-app.js", &f, entry_for(&f));

        assert!(cache.lookup_unchanged("lint-app.js", &f).unwrap().is_some());
        assert!(cache.lookup_unchanged("lint-vendor.js", &f).unwrap().is_none());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup_unchanged("lint-app.js", &f).unwrap().is_none());
    }

    #[test]
    fn changed_file_is_a_miss() {
        let dir = tempdir().unwrap();
        let f = dir.path().join("a.js");
        fs::write(&f, "var a;").unwrap();

        let cache = IncrementalCache::new();
        cache.record("s", &f, entry_for(&f));
        fs::write(&f, "var a = 42;").unwrap();

        assert!(cache.lookup_unchanged("s", &f).unwrap().is_none());
    }

    #[test]
    fn retain_drops_removed_files() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.js");
        let b = dir.path().join("b.js");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let cache = IncrementalCache::new();
        cache.record("s", &a, entry_for(&a));
        cache.record("s", &b, entry_for(&b));
        cache.retain("s", &[a.clone()]);

        assert_eq!(cache.len(), 1);
    }
}
