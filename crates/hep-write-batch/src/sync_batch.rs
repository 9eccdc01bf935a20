use std::collections::HashMap;
use std::sync::Arc;

use hep_async_engine::{AsyncEngine, EngineError};
use hep_store_core::{Category, StoreCore};
use parking_lot::Mutex;

use crate::drain::{flush_shard, Error, Kind, PendingEntry};

/// Accumulates item and product writes in memory; `flush()` groups them by
/// shard and issues one `put_multi` per shard, in parallel, via an
/// [`AsyncEngine`] (§4.4). Entries stay queued until a flush succeeds, so a
/// failed flush can simply be retried.
pub struct WriteBatch {
    store: Arc<StoreCore>,
    engine: AsyncEngine,
    pending: Mutex<Vec<PendingEntry>>,
}

impl WriteBatch {
    pub fn new(store: Arc<StoreCore>, engine: AsyncEngine) -> Self {
        Self {
            store,
            engine,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queues the creation of an item key (Dataset/Run/SubRun/Event). Never
    /// fails on a duplicate submission, even across separate calls: two
    /// `put_item` calls for the same key within one flush collapse to one
    /// write.
    pub fn put_item(&self, category: Category, routing_key: &[u8], key: &[u8]) -> Result<(), Error> {
        let shard_index = self.store.router().route(category, routing_key)?;
        self.pending.lock().push(PendingEntry {
            category,
            shard_index,
            key: key.to_vec(),
            value: Vec::new(),
            kind: Kind::Item,
        });
        Ok(())
    }

    /// Queues a product write. Two `put_product` calls for the same key
    /// within one flush surface as [`Error::DuplicateProduct`].
    pub fn put_product(&self, routing_key: &[u8], key: &[u8], value: &[u8]) -> Result<(), Error> {
        let shard_index = self.store.router().route(Category::Product, routing_key)?;
        self.pending.lock().push(PendingEntry {
            category: Category::Product,
            shard_index,
            key: key.to_vec(),
            value: value.to_vec(),
            kind: Kind::Product,
        });
        Ok(())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Flushes everything queued so far. Writes submitted concurrently with
    /// a `flush()` call may or may not be included in it; callers that need
    /// a precise cutoff should serialize their own submissions around the
    /// flush.
    pub async fn flush(&self) -> Result<(), Error> {
        let entries: Vec<PendingEntry> = std::mem::take(&mut *self.pending.lock());
        if entries.is_empty() {
            return Ok(());
        }

        let mut groups: HashMap<(Category, usize), Vec<PendingEntry>> = HashMap::new();
        for entry in entries {
            groups.entry((entry.category, entry.shard_index)).or_default().push(entry);
        }

        for ((category, shard_index), group) in groups {
            let store = self.store.clone();
            self.engine.spawn(async move {
                flush_shard(&store, category, shard_index, group, false)
                    .await
                    .map_err(EngineError::from_display)
            });
        }

        self.engine.wait().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_kv_memory::MemoryShard;
    use hep_store_core::KvShard;
    use std::collections::HashMap as StdHashMap;
    use uuid::Uuid;

    fn store_with_shards(n: usize) -> Arc<StoreCore> {
        let mut counts = StdHashMap::new();
        for c in Category::ALL {
            counts.insert(c, n);
        }
        let router = hep_shard_router::ShardRouter::new(counts);
        let mut shards: StdHashMap<Category, Vec<Arc<dyn KvShard>>> = StdHashMap::new();
        for c in Category::ALL {
            shards.insert(c, (0..n).map(|_| Arc::new(MemoryShard::new()) as Arc<dyn KvShard>).collect());
        }
        Arc::new(StoreCore::new(router, shards))
    }

    #[tokio::test]
    async fn flush_writes_every_queued_entry() {
        let store = store_with_shards(2);
        let engine = AsyncEngine::new(0).unwrap();
        let batch = WriteBatch::new(store.clone(), engine);

        let dataset = Uuid::new_v4();
        let key = hep_key_codec::ItemDescriptor::run(dataset, 1).encode(hep_key_codec::Level::Run);
        batch.put_item(Category::Run, dataset.as_bytes(), &key).unwrap();
        batch.flush().await.unwrap();

        assert!(store.exists(Category::Run, dataset.as_bytes(), &key).await.unwrap());
    }

    /// Unlike the async-drain flush, the synchronous flush has no
    /// duplicate-product check (§4.4): a key submitted twice in one flush
    /// just goes through `put_multi` unconditionally.
    #[tokio::test]
    async fn duplicate_product_in_one_flush_succeeds() {
        let store = store_with_shards(1);
        let engine = AsyncEngine::new(0).unwrap();
        let batch = WriteBatch::new(store.clone(), engine);

        batch.put_product(b"rk", b"product-key", b"v1").unwrap();
        batch.put_product(b"rk", b"product-key", b"v2").unwrap();
        batch.flush().await.unwrap();

        assert!(store.exists(Category::Product, b"rk", b"product-key").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_item_in_one_flush_is_silently_collapsed() {
        let store = store_with_shards(1);
        let engine = AsyncEngine::new(0).unwrap();
        let batch = WriteBatch::new(store, engine);

        batch.put_item(Category::Dataset, b"rk", b"item-key").unwrap();
        batch.put_item(Category::Dataset, b"rk", b"item-key").unwrap();
        batch.flush().await.unwrap();
    }
}
