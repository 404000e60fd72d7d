//! Bounded in-memory page layer.
//!
//! A performance overlay above the disk store: an `lru` map guarded by a
//! mutex, bounded by entry count independently of the manifest capacity.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use bytes::Bytes;
use lru::LruCache;

use super::keys::PageKey;

/// Entry-count bounded LRU of page blobs. `None` when disabled.
#[derive(Debug)]
pub struct MemoryLayer {
    inner: Mutex<Option<LruCache<PageKey, Bytes>>>,
}

impl MemoryLayer {
    /// Create a layer holding at most `capacity` pages; zero disables it.
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(NonZeroUsize::new(capacity).map(LruCache::new)) }
    }

    pub fn get(&self, key: &PageKey) -> Option<Bytes> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_mut().and_then(|cache| cache.get(key).cloned())
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().is_some_and(|cache| cache.contains(key))
    }

    pub fn insert(&self, key: PageKey, data: Bytes) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cache) = guard.as_mut() {
            cache.put(key, data);
        }
    }

    pub fn remove(&self, key: &PageKey) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cache) = guard.as_mut() {
            cache.pop(key);
        }
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map_or(0, LruCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
