//! `ProductCache`: a thread-safe keyed buffer cache (§4.3.3) shared by the
//! synchronous and asynchronous Prefetchers and by the
//! `ParallelEventProcessor`. Guards its map with a read-write lock, since
//! readers vastly outnumber writers once a scan's lookahead window is warm
//! (§5, "Shared-resource policy").

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    values: HashMap<Vec<u8>, Vec<u8>>,
    not_found: HashSet<Vec<u8>>,
    loading: HashSet<Vec<u8>>,
}

/// A thread-safe cache keyed by an encoded product key. Three states are
/// tracked per key: found (present in `values`), known-absent
/// (`not_found`), or currently being fetched (`loading`) -- the last of
/// which lets the asynchronous prefetcher deduplicate concurrent loads of
/// the same product (§4.3.2).
pub struct ProductCache {
    inner: RwLock<Inner>,
    notify: Notify,
}

impl Default for ProductCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            notify: Notify::new(),
        }
    }

    /// Records a successfully loaded product, clearing any `not_found` or
    /// `loading` marker, and wakes tasks waiting on it.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        {
            let mut inner = self.inner.write();
            inner.not_found.remove(&key);
            inner.loading.remove(&key);
            inner.values.insert(key, value);
        }
        self.notify.notify_waiters();
    }

    /// Records that `key` was probed and does not exist.
    pub fn mark_not_found(&self, key: Vec<u8>) {
        {
            let mut inner = self.inner.write();
            inner.loading.remove(&key);
            inner.not_found.insert(key);
        }
        self.notify.notify_waiters();
    }

    /// Attempts to claim responsibility for loading `key`. Returns `true`
    /// if the caller is now the sole loader and should fetch it; `false`
    /// if another task already claimed it and the caller should instead
    /// `wait_for` the result.
    pub fn begin_loading(&self, key: &[u8]) -> bool {
        let mut inner = self.inner.write();
        if inner.values.contains_key(key) || inner.not_found.contains(key) || inner.loading.contains(key) {
            false
        } else {
            inner.loading.insert(key.to_vec());
            true
        }
    }

    /// Waits until `key` resolves to found or not-found, then returns its
    /// value (if any). Used by a second caller that found `begin_loading`
    /// already claimed.
    pub async fn wait_for(self: &Arc<Self>, key: &[u8]) -> Option<Vec<u8>> {
        loop {
            {
                let inner = self.inner.read();
                if let Some(v) = inner.values.get(key) {
                    return Some(v.clone());
                }
                if inner.not_found.contains(key) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Looks up `key` without erasing it. If the key is in none of the
    /// three states, this almost always indicates a missing `preload` call
    /// upstream (§4.3.3), so a warning is logged.
    pub fn peek(&self, key: &[u8]) -> Option<Vec<u8>> {
        let inner = self.inner.read();
        if let Some(v) = inner.values.get(key) {
            return Some(v.clone());
        }
        if !inner.not_found.contains(key) && !inner.loading.contains(key) {
            tracing::warn!(
                "product requested that was neither found nor marked for preload; \
                 this usually means a missing preload() registration"
            );
        }
        None
    }

    /// Looks up `key`, and if found, removes it from the cache. The
    /// asynchronous prefetcher uses this: items are one-shot, consumed
    /// exactly once by the caller (§4.3.2).
    pub fn take(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut inner = self.inner.write();
        if let Some(v) = inner.values.remove(key) {
            return Some(v);
        }
        if !inner.not_found.contains(key) && !inner.loading.contains(key) {
            tracing::warn!(
                "product requested that was neither found nor marked for preload; \
                 this usually means a missing preload() registration"
            );
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_peek() {
        let cache = ProductCache::new();
        cache.insert(b"k".to_vec(), b"v".to_vec());
        assert_eq!(cache.peek(b"k"), Some(b"v".to_vec()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn take_removes_entry() {
        let cache = ProductCache::new();
        cache.insert(b"k".to_vec(), b"v".to_vec());
        assert_eq!(cache.take(b"k"), Some(b"v".to_vec()));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn begin_loading_claims_exclusively() {
        let cache = ProductCache::new();
        assert!(cache.begin_loading(b"k"));
        assert!(!cache.begin_loading(b"k"));
    }

    #[tokio::test]
    async fn wait_for_unblocks_on_insert() {
        let cache = Arc::new(ProductCache::new());
        assert!(cache.begin_loading(b"k"));

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_for(b"k").await })
        };

        tokio::task::yield_now().await;
        cache.insert(b"k".to_vec(), b"v".to_vec());

        let result = waiter.await.unwrap();
        assert_eq!(result, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn wait_for_unblocks_on_not_found() {
        let cache = Arc::new(ProductCache::new());
        assert!(cache.begin_loading(b"k"));

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_for(b"k").await })
        };

        tokio::task::yield_now().await;
        cache.mark_not_found(b"k".to_vec());

        let result = waiter.await.unwrap();
        assert_eq!(result, None);
    }
}
