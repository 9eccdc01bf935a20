use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use hep_shard_router::{Category, ShardRouter};

use crate::error::Error;
use crate::kv_shard::{KvShard, ShardError};

/// Outcome of [`StoreCore::put_once`]: item-key creation is idempotent, so
/// finding the key already present is not an error (§7, `AlreadyExistsIgnored`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOnceOutcome {
    Stored,
    AlreadyExists,
}

/// Low-level put/get/list operations over a set of sharded `KvShard`s,
/// dispatched by `ShardRouter` (§4.1). A single transient transport fault
/// per call is retried once; all other errors and a second transient fault
/// surface to the caller unchanged.
pub struct StoreCore {
    router: ShardRouter,
    shards: HashMap<Category, Vec<Arc<dyn KvShard>>>,
}

impl StoreCore {
    pub fn new(router: ShardRouter, shards: HashMap<Category, Vec<Arc<dyn KvShard>>>) -> Self {
        Self { router, shards }
    }

    pub fn router(&self) -> &ShardRouter {
        &self.router
    }

    /// Number of shards configured for `category`.
    pub fn shard_count(&self, category: Category) -> usize {
        self.shards.get(&category).map(|v| v.len()).unwrap_or(0)
    }

    /// The shard a given `(category, routing_key)` pair routes to.
    pub fn shard_for(&self, category: Category, routing_key: &[u8]) -> Result<Arc<dyn KvShard>, Error> {
        let index = self.router.route(category, routing_key)?;
        self.shards
            .get(&category)
            .and_then(|v| v.get(index))
            .cloned()
            .ok_or_else(|| Error::Logic(format!("router returned out-of-range index {index} for {category:?}")))
    }

    /// A specific shard within `category`, addressed directly by index.
    /// Used by enumerators (e.g. `EventSet`) that iterate one shard at a
    /// time rather than routing by key.
    pub fn shard_at(&self, category: Category, index: usize) -> Result<Arc<dyn KvShard>, Error> {
        self.shards
            .get(&category)
            .and_then(|v| v.get(index))
            .cloned()
            .ok_or_else(|| Error::Logic(format!("no shard {index} in category {category:?}")))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, ShardError>>,
    {
        match op().await {
            Ok(v) => Ok(v),
            Err(ShardError::Transient(msg)) => {
                tracing::warn!(error = %msg, "transient shard fault, retrying once");
                op().await.map_err(Error::from_shard)
            }
            Err(e) => Err(Error::from_shard(e)),
        }
    }

    pub async fn put_once(
        &self,
        category: Category,
        routing_key: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> Result<PutOnceOutcome, Error> {
        let shard = self.shard_for(category, routing_key)?;
        let stored = self
            .with_retry(|| shard.put_if_absent(key, value))
            .await?;
        Ok(if stored {
            PutOnceOutcome::Stored
        } else {
            PutOnceOutcome::AlreadyExists
        })
    }

    pub async fn put(
        &self,
        category: Category,
        routing_key: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> Result<(), Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.put(key, value)).await
    }

    /// `put_multi` on the shard selected by `routing_key`.
    pub async fn put_multi(
        &self,
        category: Category,
        routing_key: &[u8],
        items: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<(), Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.put_multi(items)).await
    }

    /// `put_multi` on a directly-addressed shard index, bypassing routing.
    /// Used by `WriteBatch` flushes, which already know which shard each
    /// entry belongs to from routing it once at accumulation time (§4.4).
    pub async fn put_multi_on_shard(
        &self,
        category: Category,
        shard_index: usize,
        items: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<(), Error> {
        let shard = self.shard_at(category, shard_index)?;
        self.with_retry(|| shard.put_multi(items)).await
    }

    pub async fn get(
        &self,
        category: Category,
        routing_key: &[u8],
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.get(key)).await
    }

    pub async fn length(
        &self,
        category: Category,
        routing_key: &[u8],
        key: &[u8],
    ) -> Result<Option<usize>, Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.length(key)).await
    }

    pub async fn exists(
        &self,
        category: Category,
        routing_key: &[u8],
        key: &[u8],
    ) -> Result<bool, Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.exists(key)).await
    }

    /// `list_range` on the shard selected by `routing_key`.
    pub async fn list_range(
        &self,
        category: Category,
        routing_key: &[u8],
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.list_range(start_exclusive, prefix, max))
            .await
    }

    pub async fn list_range_kv(
        &self,
        category: Category,
        routing_key: &[u8],
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let shard = self.shard_for(category, routing_key)?;
        self.with_retry(|| shard.list_range_kv(start_exclusive, prefix, max))
            .await
    }

    /// `exists` on a directly-addressed shard index, bypassing routing.
    /// Used by multi-shard event enumeration (§4.2).
    pub async fn exists_on_shard(
        &self,
        category: Category,
        shard_index: usize,
        key: &[u8],
    ) -> Result<bool, Error> {
        let shard = self.shard_at(category, shard_index)?;
        self.with_retry(|| shard.exists(key)).await
    }

    /// `list_range` on a directly-addressed shard index, bypassing routing.
    /// Used by multi-shard event enumeration (§4.2).
    pub async fn list_range_on_shard(
        &self,
        category: Category,
        shard_index: usize,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<Vec<u8>>, Error> {
        let shard = self.shard_at(category, shard_index)?;
        self.with_retry(|| shard.list_range(start_exclusive, prefix, max))
            .await
    }

    /// `list_range_kv` on a directly-addressed shard index, bypassing
    /// routing. Used by whole-keyspace scans that need the stored value
    /// alongside the key (e.g. the `ls` CLI's dataset tree, which has no
    /// routing key to enumerate datasets by).
    pub async fn list_range_kv_on_shard(
        &self,
        category: Category,
        shard_index: usize,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let shard = self.shard_at(category, shard_index)?;
        self.with_retry(|| shard.list_range_kv(start_exclusive, prefix, max))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyOnce {
        inner: hep_kv_memory_testonly::Memory,
        failures_remaining: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl KvShard for FlakyOnce {
        async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ShardError> {
            self.maybe_fail()?;
            self.inner.put(key, value).await
        }
        async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, ShardError> {
            self.maybe_fail()?;
            self.inner.put_if_absent(key, value).await
        }
        async fn put_multi(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), ShardError> {
            self.maybe_fail()?;
            self.inner.put_multi(items).await
        }
        async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShardError> {
            self.maybe_fail()?;
            self.inner.get(key).await
        }
        async fn length(&self, key: &[u8]) -> Result<Option<usize>, ShardError> {
            self.maybe_fail()?;
            self.inner.length(key).await
        }
        async fn exists(&self, key: &[u8]) -> Result<bool, ShardError> {
            self.maybe_fail()?;
            self.inner.exists(key).await
        }
        async fn list_range(
            &self,
            s: Option<&[u8]>,
            p: &[u8],
            m: usize,
        ) -> Result<Vec<Vec<u8>>, ShardError> {
            self.maybe_fail()?;
            self.inner.list_range(s, p, m).await
        }
        async fn list_range_kv(
            &self,
            s: Option<&[u8]>,
            p: &[u8],
            m: usize,
        ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ShardError> {
            self.maybe_fail()?;
            self.inner.list_range_kv(s, p, m).await
        }
    }

    impl FlakyOnce {
        fn maybe_fail(&self) -> Result<(), ShardError> {
            if self.failures_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            }).is_ok() {
                Err(ShardError::Transient("injected".into()))
            } else {
                Ok(())
            }
        }
    }

    fn one_shard_core(failures: usize) -> StoreCore {
        let mut counts = HashMap::new();
        counts.insert(Category::Event, 1);
        let router = ShardRouter::new(counts);

        let shard: Arc<dyn KvShard> = Arc::new(FlakyOnce {
            inner: hep_kv_memory_testonly::Memory::new(),
            failures_remaining: AtomicUsize::new(failures),
        });
        let mut shards = HashMap::new();
        shards.insert(Category::Event, vec![shard]);
        StoreCore::new(router, shards)
    }

    #[tokio::test]
    async fn retries_once_on_transient_fault() {
        let core = one_shard_core(1);
        let outcome = core.put_once(Category::Event, b"rk", b"key", b"value").await.unwrap();
        assert_eq!(outcome, PutOnceOutcome::Stored);
    }

    #[tokio::test]
    async fn second_transient_fault_surfaces_as_transport_error() {
        let core = one_shard_core(2);
        let err = core.put_once(Category::Event, b"rk", b"key", b"value").await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }
}

#[cfg(test)]
mod hep_kv_memory_testonly {
    //! A minimal in-memory `KvShard` used only by this crate's own tests, so
    //! `hep-store-core` need not depend on `hep-kv-memory` to test retry
    //! behavior.
    use super::*;
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    pub struct Memory {
        data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
    }

    impl Memory {
        pub fn new() -> Self {
            Self {
                data: Mutex::new(BTreeMap::new()),
            }
        }

        pub async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ShardError> {
            self.data.lock().await.insert(key.to_vec(), value.to_vec());
            Ok(())
        }

        pub async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, ShardError> {
            let mut data = self.data.lock().await;
            if data.contains_key(key) {
                Ok(false)
            } else {
                data.insert(key.to_vec(), value.to_vec());
                Ok(true)
            }
        }

        pub async fn put_multi(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), ShardError> {
            let mut data = self.data.lock().await;
            for (k, v) in items {
                data.insert(k.clone(), v.clone());
            }
            Ok(())
        }

        pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShardError> {
            Ok(self.data.lock().await.get(key).cloned())
        }

        pub async fn length(&self, key: &[u8]) -> Result<Option<usize>, ShardError> {
            Ok(self.data.lock().await.get(key).map(|v| v.len()))
        }

        pub async fn exists(&self, key: &[u8]) -> Result<bool, ShardError> {
            Ok(self.data.lock().await.contains_key(key))
        }

        pub async fn list_range(
            &self,
            start_exclusive: Option<&[u8]>,
            prefix: &[u8],
            max: usize,
        ) -> Result<Vec<Vec<u8>>, ShardError> {
            let data = self.data.lock().await;
            let iter = match start_exclusive {
                Some(s) => data.range((std::ops::Bound::Excluded(s.to_vec()), std::ops::Bound::Unbounded)),
                None => data.range(..),
            };
            Ok(iter
                .map(|(k, _)| k)
                .filter(|k| k.starts_with(prefix))
                .take(max)
                .cloned()
                .collect())
        }

        pub async fn list_range_kv(
            &self,
            start_exclusive: Option<&[u8]>,
            prefix: &[u8],
            max: usize,
        ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ShardError> {
            let data = self.data.lock().await;
            let iter = match start_exclusive {
                Some(s) => data.range((std::ops::Bound::Excluded(s.to_vec()), std::ops::Bound::Unbounded)),
                None => data.range(..),
            };
            Ok(iter
                .filter(|(k, _)| k.starts_with(prefix))
                .take(max)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect())
        }
    }
}
