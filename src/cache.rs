//! Query → answer memo table.
//!
//! Keys are the exact query string; `"Foo"` and `"foo "` are different
//! entries. Entries never expire. The table is bounded: once `capacity`
//! entries exist, inserting a new query evicts the least recently used one.
//! A mutex guards the map so one cache can be shared by concurrent HTTP
//! requests; concurrent writes to the same key resolve last-write-wins.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::models::CacheEntry;

pub struct AnswerCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl AnswerCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, query: &str) -> Option<CacheEntry> {
        self.lock().get(query).cloned()
    }

    pub fn put(&self, query: &str, entry: CacheEntry) {
        if let Some((evicted, _)) = self.lock().push(query.to_string(), entry) {
            if evicted != query {
                tracing::debug!(evicted = %evicted, "answer cache evicted entry");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
