//! Single-use attribute cache
//!
//! Directory listings already carry sizes and timestamps. Stashing them here
//! lets the attribute read that usually follows a listing skip its own round
//! trip. Entries expire after a TTL and are removed on first read, so a
//! snapshot is never served twice.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::attributes::FileAttributes;
use crate::path::ObjectPath;

#[derive(Debug)]
struct CachedAttributes {
    attributes: FileAttributes,
    fetched_at: Instant,
}

/// Per-path attribute snapshots keyed by path identity
#[derive(Debug)]
pub struct AttributeCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedAttributes>>,
}

impl AttributeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // A poisoned lock only means another reader panicked; the map is still usable.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedAttributes>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a snapshot fetched just now
    pub fn put(&self, path: &ObjectPath, attributes: FileAttributes) {
        self.put_fetched_at(path, attributes, Instant::now());
    }

    /// Store a snapshot with an explicit fetch time
    pub fn put_fetched_at(&self, path: &ObjectPath, attributes: FileAttributes, fetched_at: Instant) {
        self.entries().insert(
            path.identity(),
            CachedAttributes {
                attributes,
                fetched_at,
            },
        );
    }

    /// Remove and return the snapshot for `path` if it is still fresh
    pub fn take(&self, path: &ObjectPath) -> Option<FileAttributes> {
        self.take_if(path, |_| true)
    }

    /// Like [`take`](Self::take), but only consumes a fresh snapshot that
    /// satisfies `accept`. A stale snapshot is dropped either way.
    pub fn take_if<F>(&self, path: &ObjectPath, accept: F) -> Option<FileAttributes>
    where
        F: FnOnce(&FileAttributes) -> bool,
    {
        let mut entries = self.entries();
        let key = path.identity();
        let entry = entries.get(&key)?;

        if entry.fetched_at.elapsed() > self.ttl {
            entries.remove(&key);
            return None;
        }
        if !accept(&entry.attributes) {
            return None;
        }
        entries.remove(&key).map(|e| e.attributes)
    }

    pub fn evict(&self, path: &ObjectPath) {
        self.entries().remove(&path.identity());
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
