use std::collections::VecDeque;
use std::sync::Arc;

use hep_cache::ProductCache;
use hep_hierarchy::Cursor;
use hep_key_codec::{encode_product_key, ItemDescriptor, ProductKey};
use hep_product_store::ProductStore;

use crate::error::Error;

/// Bounded lookahead iteration plus product preloading, driven entirely by
/// the caller's own `next_items` calls (§4.3.1). No background task: a
/// refill only happens when `next_items` itself is called and the
/// in-memory window is exhausted.
pub struct SyncPrefetcher {
    cursor: Cursor,
    item_cache: VecDeque<ItemDescriptor>,
    cache_size: usize,
    batch_size: usize,
    active_products: Vec<ProductKey>,
    products: Arc<ProductStore>,
    cache: Arc<ProductCache>,
}

impl SyncPrefetcher {
    pub fn new(
        cursor: Cursor,
        products: Arc<ProductStore>,
        cache: Arc<ProductCache>,
        cache_size: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            cursor,
            item_cache: VecDeque::with_capacity(cache_size),
            cache_size,
            batch_size,
            active_products: Vec::new(),
            products,
            cache,
        }
    }

    /// Registers a product key to preload alongside every item fetched from
    /// here on. Does not retroactively load products for items already in
    /// the window.
    pub fn preload(&mut self, product: ProductKey) {
        self.active_products.push(product);
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    /// Returns up to `max` items strictly greater than `current`, refilling
    /// the lookahead window from the store if the current window is
    /// exhausted (§4.3.1).
    pub async fn next_items(&mut self, current: ItemDescriptor, max: usize) -> Result<Vec<ItemDescriptor>, Error> {
        let available = self.item_cache.iter().filter(|d| **d > current).count();
        if available == 0 {
            self.item_cache.clear();
            self.refill().await?;
        }

        let take = max.min(self.item_cache.len());
        let out: Vec<_> = self.item_cache.drain(..take).collect();
        Ok(out)
    }

    async fn refill(&mut self) -> Result<(), Error> {
        loop {
            let batch = self.cursor.next_batch(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let short_read = batch.len() < self.batch_size;
            for item in &batch {
                self.preload_active_products(item).await?;
                self.item_cache.push_back(*item);
            }
            if self.item_cache.len() >= self.cache_size || short_read {
                break;
            }
        }
        Ok(())
    }

    async fn preload_active_products(&self, item: &ItemDescriptor) -> Result<(), Error> {
        for product in &self.active_products {
            let key = encode_product_key(item, product);
            match self.products.load(item, product).await? {
                Some(value) => self.cache.insert(key, value),
                None => self.cache.mark_not_found(key),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_hierarchy::Client as HierarchyClient;
    use hep_kv_memory::MemoryShard;
    use hep_store_core::{Category, KvShard, StoreCore};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn client_with_shards() -> HierarchyClient {
        let mut counts = HashMap::new();
        for c in Category::ALL {
            counts.insert(c, 1);
        }
        let router = hep_shard_router::ShardRouter::new(counts);
        let mut shards: HashMap<Category, Vec<Arc<dyn KvShard>>> = HashMap::new();
        for c in Category::ALL {
            shards.insert(c, vec![Arc::new(MemoryShard::new()) as Arc<dyn KvShard>]);
        }
        HierarchyClient::new(Arc::new(StoreCore::new(router, shards)))
    }

    #[tokio::test]
    async fn prefetched_scan_visits_every_event_in_order_and_loads_products() {
        let client = client_with_shards();
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        let run = dataset.create_run(1).await.unwrap();
        let subrun = run.create_subrun(1).await.unwrap();

        let product = ProductKey::new("mylabel", "hep::Hit");
        for n in 0..20u64 {
            let event = subrun.create_event(n).await.unwrap();
            event.store_product(&product, format!("payload-{n}").as_bytes()).await.unwrap();
        }

        let cursor = subrun.events();
        let cache = Arc::new(ProductCache::new());
        let mut prefetcher =
            SyncPrefetcher::new(cursor, client.products().clone(), cache.clone(), 8, 4);
        prefetcher.preload(product.clone());

        let dataset_uuid = dataset.uuid();
        let mut current = ItemDescriptor::event(dataset_uuid, 0, 0, 0);
        let mut seen = Vec::new();
        loop {
            let batch = prefetcher.next_items(current, 3).await.unwrap();
            if batch.is_empty() {
                break;
            }
            for item in &batch {
                let key = encode_product_key(item, &product);
                assert!(cache.peek(&key).is_some());
                seen.push(item.event);
            }
            current = *batch.last().unwrap();
        }

        assert_eq!(seen, (0..20).collect::<Vec<_>>());
        assert_eq!(cache.len(), 20);
    }
}
