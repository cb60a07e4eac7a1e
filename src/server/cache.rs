//! Bounded read-through cache of parsed snapshot files.
//!
//! Entries are keyed by resource name and remember the modification time of
//! the file they were parsed from; a newer file on disk (the pipeline ran
//! again) invalidates the entry on the next read. When full, the least
//! recently used entry is evicted.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use tracing::debug;

use crate::error::SnapshotError;

struct Entry<V> {
    value: Arc<V>,
    modified: Option<SystemTime>,
    last_used: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    clock: u64,
}

pub struct SnapshotCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V> SnapshotCache<V> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached value for `key`, parsing `path` with `load` when
    /// absent or stale.
    ///
    /// The lock is held while loading so concurrent first reads parse once.
    pub fn get_or_load<F>(&self, key: &str, path: &Path, load: F) -> Result<Arc<V>, SnapshotError>
    where
        F: FnOnce(&Path) -> Result<V, SnapshotError>,
    {
        let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();

        let mut inner = self.lock();
        inner.clock += 1;
        let now = inner.clock;

        if let Some(entry) = inner.entries.get_mut(key) {
            if entry.modified == modified {
                entry.last_used = now;
                return Ok(Arc::clone(&entry.value));
            }
            debug!(key, "Cached snapshot is stale");
        }
        inner.entries.remove(key);

        let value = Arc::new(load(path)?);

        if inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                debug!(evicted = %oldest, "Cache full, evicting");
                inner.entries.remove(&oldest);
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: Arc::clone(&value),
                modified,
                last_used: now,
            },
        );
        debug!(key, "Snapshot cached");
        Ok(value)
    }

    /// Drops the entry for `key`, if any.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // entries are only replaced wholesale, so a poisoned map is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("insertion_dashboard_cache_{name}"));
        fs::write(&path, content).unwrap();
        path
    }

    fn read(path: &Path) -> Result<String, SnapshotError> {
        fs::read_to_string(path).map_err(|e| SnapshotError::io(path, e))
    }

    #[test]
    fn test_loads_once_then_reuses() {
        let path = temp_file("reuse", "hello");
        let cache = SnapshotCache::new(2);
        let calls = Cell::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_load("a", &path, |p| {
                    calls.set(calls.get() + 1);
                    read(p)
                })
                .unwrap();
            assert_eq!(v.as_str(), "hello");
        }
        assert_eq!(calls.get(), 1);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let path = temp_file("evict", "x");
        let cache = SnapshotCache::new(2);

        cache.get_or_load("a", &path, read).unwrap();
        cache.get_or_load("b", &path, read).unwrap();
        cache.get_or_load("a", &path, read).unwrap(); // a is now most recent
        cache.get_or_load("c", &path, read).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("b"));
        assert!(cache.invalidate("c"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_error_is_not_cached() {
        let cache: SnapshotCache<String> = SnapshotCache::new(1);
        let missing = Path::new("/no/such/snapshot.json");

        assert!(cache.get_or_load("a", missing, read).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_newer_file_replaces_cached_value() {
        let path = temp_file("mtime", "v1");
        let cache = SnapshotCache::new(1);
        assert_eq!(cache.get_or_load("a", &path, read).unwrap().as_str(), "v1");

        fs::write(&path, "v2").unwrap();
        let bumped = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(bumped)
            .unwrap();

        assert_eq!(cache.get_or_load("a", &path, read).unwrap().as_str(), "v2");
        assert_eq!(cache.len(), 1);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_clear_forces_reload() {
        let path = temp_file("clear", "v1");
        let cache = SnapshotCache::new(1);
        assert_eq!(cache.get_or_load("a", &path, read).unwrap().as_str(), "v1");

        // same mtime granularity may hide the rewrite, so invalidate explicitly
        fs::write(&path, "v2").unwrap();
        cache.clear();
        assert_eq!(cache.get_or_load("a", &path, read).unwrap().as_str(), "v2");
        fs::remove_file(&path).unwrap();
    }
}
