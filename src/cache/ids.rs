//! Path-to-id cache
//!
//! Memoizes relative-path to Drive object id resolution for the lifetime of
//! the process. Entries never expire on their own.

use std::sync::atomic::{AtomicU64, Ordering};

use moka::sync::Cache;
use tracing::{debug, trace};

/// Folder and file id caches for one Drive backend
///
/// Folder ids are immutable once resolved. File ids are hints: a caller that
/// finds one stale evicts it with [`PathIdCache::evict_file`].
pub struct PathIdCache {
    /// Relative folder path to folder id
    folders: Cache<String, String>,
    /// Relative file path to file id
    files: Cache<String, String>,
    /// Cache hit counter
    hits: AtomicU64,
    /// Cache miss counter
    misses: AtomicU64,
}

impl PathIdCache {
    pub fn new() -> Self {
        Self {
            folders: Cache::builder().name("folder_id_cache").build(),
            files: Cache::builder().name("file_id_cache").build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn record(&self, kind: &str, path: &str, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(kind = kind, path = path, "Id cache HIT");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(kind = kind, path = path, "Id cache MISS");
        }
    }

    /// Cached id of a folder
    pub fn folder(&self, path: &str) -> Option<String> {
        let id = self.folders.get(path);
        self.record("folder", path, id.is_some());
        id
    }

    pub fn insert_folder(&self, path: &str, id: &str) {
        self.folders.insert(path.to_string(), id.to_string());
        debug!(path = path, id = id, "Cached folder id");
    }

    /// Cached id of a file
    pub fn file(&self, path: &str) -> Option<String> {
        let id = self.files.get(path);
        self.record("file", path, id.is_some());
        id
    }

    pub fn insert_file(&self, path: &str, id: &str) {
        self.files.insert(path.to_string(), id.to_string());
        trace!(path = path, id = id, "Cached file id");
    }

    /// Forget a file id that turned out to be stale
    pub fn evict_file(&self, path: &str) {
        self.files.invalidate(path);
        debug!(path = path, "Evicted stale file id");
    }

    /// Number of cached (folders, files)
    pub fn entry_counts(&self) -> (u64, u64) {
        self.folders.run_pending_tasks();
        self.files.run_pending_tasks();
        (self.folders.entry_count(), self.files.entry_count())
    }

    /// Get cache statistics
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        let (folders, files) = self.entry_counts();

        debug!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            folder_entries = folders,
            file_entries = files,
            "Id cache metrics"
        );
    }
}

impl Default for PathIdCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_miss() {
        let cache = PathIdCache::new();

        assert!(cache.folder("logs").is_none());
        let (_, _, hit_rate) = cache.stats();
        assert_eq!(hit_rate, 0.0);

        cache.insert_folder("logs", "f-1");
        assert_eq!(cache.folder("logs").as_deref(), Some("f-1"));

        let (hits, misses, hit_rate) = cache.stats();
        assert_eq!(hits, 1);
        assert_eq!(misses, 1);
        assert!(hit_rate > 49.0 && hit_rate < 51.0);
    }

    #[test]
    fn test_folders_and_files_are_separate() {
        let cache = PathIdCache::new();
        cache.insert_folder("logs", "folder-id");
        cache.insert_file("logs", "file-id");

        assert_eq!(cache.folder("logs").as_deref(), Some("folder-id"));
        assert_eq!(cache.file("logs").as_deref(), Some("file-id"));
        assert_eq!(cache.entry_counts(), (1, 1));
    }

    #[test]
    fn test_evict_file() {
        let cache = PathIdCache::new();
        cache.insert_file("logs/a.md", "id-a");
        cache.evict_file("logs/a.md");
        assert!(cache.file("logs/a.md").is_none());
    }
}
