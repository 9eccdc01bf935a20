//! An in-process `KvShard`: a `BTreeMap` behind a lock. This stands in for
//! the production shard-KV provider (§1 names it out of scope) in this
//! workspace's own tests and in small demos; it is not meant to be run as a
//! deployed provider.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use hep_store_core::{KvShard, ShardError};
use parking_lot::Mutex;

pub struct MemoryShard {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    /// When nonzero, the next that-many fallible calls return
    /// `ShardError::Transient`, then behave normally. Lets tests exercise
    /// `StoreCore`'s retry-once path against a more realistic shard.
    inject_transient_failures: AtomicUsize,
}

impl Default for MemoryShard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryShard {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(BTreeMap::new()),
            inject_transient_failures: AtomicUsize::new(0),
        }
    }

    /// Schedule the next `n` operations to fail with a transient error.
    pub fn inject_transient_failures(&self, n: usize) {
        self.inject_transient_failures.store(n, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), ShardError> {
        let prev = self.inject_transient_failures.load(Ordering::SeqCst);
        if prev > 0
            && self
                .inject_transient_failures
                .compare_exchange(prev, prev - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(ShardError::Transient("injected test failure".into()));
        }
        Ok(())
    }

    fn list_range_locked<'a>(
        data: &'a BTreeMap<Vec<u8>, Vec<u8>>,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Vec<(&'a Vec<u8>, &'a Vec<u8>)> {
        let range = match start_exclusive {
            Some(s) => data.range::<[u8], _>((Bound::Excluded(s), Bound::Unbounded)),
            None => data.range::<[u8], _>((Bound::Unbounded, Bound::Unbounded)),
        };
        // A linear scan is adequate for an in-process test double; a real
        // shard would seek directly to `prefix`.
        range
            .filter(|(k, _)| k.starts_with(prefix))
            .take(max)
            .collect()
    }
}

#[async_trait]
impl KvShard for MemoryShard {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ShardError> {
        self.maybe_fail()?;
        self.data.lock().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, ShardError> {
        self.maybe_fail()?;
        let mut data = self.data.lock();
        if data.contains_key(key) {
            Ok(false)
        } else {
            data.insert(key.to_vec(), value.to_vec());
            Ok(true)
        }
    }

    async fn put_multi(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), ShardError> {
        self.maybe_fail()?;
        let mut data = self.data.lock();
        for (k, v) in items {
            data.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShardError> {
        self.maybe_fail()?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn length(&self, key: &[u8]) -> Result<Option<usize>, ShardError> {
        self.maybe_fail()?;
        Ok(self.data.lock().get(key).map(|v| v.len()))
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, ShardError> {
        self.maybe_fail()?;
        Ok(self.data.lock().contains_key(key))
    }

    async fn list_range(
        &self,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<Vec<u8>>, ShardError> {
        self.maybe_fail()?;
        let data = self.data.lock();
        Ok(Self::list_range_locked(&data, start_exclusive, prefix, max)
            .into_iter()
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn list_range_kv(
        &self,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ShardError> {
        self.maybe_fail()?;
        let data = self.data.lock();
        Ok(Self::list_range_locked(&data, start_exclusive, prefix, max)
            .into_iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_if_absent_is_idempotent() {
        let shard = MemoryShard::new();
        assert!(shard.put_if_absent(b"k", b"v1").await.unwrap());
        assert!(!shard.put_if_absent(b"k", b"v2").await.unwrap());
        assert_eq!(shard.get(b"k").await.unwrap(), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn list_range_respects_prefix_and_exclusive_start() {
        let shard = MemoryShard::new();
        for k in [b"a/1".to_vec(), b"a/2".to_vec(), b"a/3".to_vec(), b"b/1".to_vec()] {
            shard.put(&k, b"").await.unwrap();
        }
        let keys = shard.list_range(Some(b"a/1"), b"a/", 10).await.unwrap();
        assert_eq!(keys, vec![b"a/2".to_vec(), b"a/3".to_vec()]);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_once() {
        let shard = MemoryShard::new();
        shard.inject_transient_failures(1);
        assert!(shard.get(b"k").await.is_err());
        assert!(shard.get(b"k").await.is_ok());
    }
}
