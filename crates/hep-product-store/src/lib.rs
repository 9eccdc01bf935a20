//! Store/load named products attached to any item or to a dataset (§4.1
//! C5). Products are opaque byte buffers: serialization of user types is
//! out of scope (§1) and left to the caller, except for a POD fast path
//! ([`ProductStore::store_pod`]/[`load_pod`]) that transmutes plain,
//! fixed-layout values directly without a serialization step.

use std::sync::Arc;

use hep_key_codec::{decode_product_key, encode_product_key, ItemDescriptor, ProductKey};
use hep_store_core::{Category, StoreCore};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] hep_store_core::Error),
    #[error(transparent)]
    Key(#[from] hep_key_codec::Error),
    #[error("product value is not a valid {0}: wrong size or alignment")]
    Pod(&'static str),
}

/// Stores and loads products keyed by `(item, label, type_name)`. The
/// routing key for a product is its full encoded key (§4.1): each
/// `(item, label, type)` triple is placed independently by the products
/// ring, so two products on the same item need not share a shard.
pub struct ProductStore {
    store: Arc<StoreCore>,
}

impl ProductStore {
    pub fn new(store: Arc<StoreCore>) -> Self {
        Self { store }
    }

    /// Unconditional upsert (§3.3: overwriting a product silently loses the
    /// prior value).
    pub async fn store(
        &self,
        item: &ItemDescriptor,
        product: &ProductKey,
        value: &[u8],
    ) -> Result<(), Error> {
        let key = encode_product_key(item, product);
        self.store.put(Category::Product, &key, &key, value).await?;
        Ok(())
    }

    /// Returns `None` if no product with this key has ever been stored.
    pub async fn load(
        &self,
        item: &ItemDescriptor,
        product: &ProductKey,
    ) -> Result<Option<Vec<u8>>, Error> {
        let key = encode_product_key(item, product);
        Ok(self.store.get(Category::Product, &key, &key).await?)
    }

    pub async fn exists(&self, item: &ItemDescriptor, product: &ProductKey) -> Result<bool, Error> {
        let key = encode_product_key(item, product);
        Ok(self.store.exists(Category::Product, &key, &key).await?)
    }

    /// Size of the stored value in bytes, without fetching it.
    pub async fn length(
        &self,
        item: &ItemDescriptor,
        product: &ProductKey,
    ) -> Result<Option<usize>, Error> {
        let key = encode_product_key(item, product);
        Ok(self.store.length(Category::Product, &key, &key).await?)
    }

    /// POD fast path: stores `value` by transmuting it directly to bytes,
    /// skipping any serialization step. Only types with no padding and no
    /// interior uninitialized bytes (`bytemuck::NoUninit`) qualify.
    pub async fn store_pod<T: bytemuck::NoUninit>(
        &self,
        item: &ItemDescriptor,
        product: &ProductKey,
        value: &T,
    ) -> Result<(), Error> {
        self.store(item, product, bytemuck::bytes_of(value)).await
    }

    /// POD fast path counterpart to [`Self::store_pod`].
    pub async fn load_pod<T: bytemuck::AnyBitPattern>(
        &self,
        item: &ItemDescriptor,
        product: &ProductKey,
    ) -> Result<Option<T>, Error> {
        match self.load(item, product).await? {
            Some(bytes) => {
                let value = bytemuck::try_from_bytes::<T>(&bytes)
                    .map_err(|_| Error::Pod(std::any::type_name::<T>()))?;
                Ok(Some(*value))
            }
            None => Ok(None),
        }
    }

    /// Lists the `(label, type)` pairs attached to `item`, by scanning the
    /// products ring's shards for keys whose prefix is `item`'s full
    /// descriptor. Since products route by their *full* key rather than by
    /// `item` alone, this must fan out across every products shard.
    pub async fn list(&self, item: &ItemDescriptor) -> Result<Vec<ProductKey>, Error> {
        let prefix = item.to_full_bytes();
        let mut out = Vec::new();
        for shard in 0..self.store.shard_count(Category::Product) {
            let mut start: Option<Vec<u8>> = None;
            loop {
                let keys = self
                    .store
                    .list_range_on_shard(Category::Product, shard, start.as_deref(), &prefix, 64)
                    .await?;
                if keys.is_empty() {
                    break;
                }
                let got = keys.len();
                for key in &keys {
                    let (_, product) = decode_product_key(key)?;
                    out.push(product);
                }
                start = keys.last().cloned();
                if got < 64 {
                    break;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_kv_memory::MemoryShard;
    use hep_store_core::Category as Cat;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn store_with_shards(n: usize) -> Arc<StoreCore> {
        let mut counts = HashMap::new();
        counts.insert(Cat::Product, n);
        let router = hep_shard_router::ShardRouter::new(counts);
        let mut shards: HashMap<Cat, Vec<Arc<dyn hep_store_core::KvShard>>> = HashMap::new();
        shards.insert(
            Cat::Product,
            (0..n).map(|_| Arc::new(MemoryShard::new()) as Arc<dyn hep_store_core::KvShard>).collect(),
        );
        Arc::new(StoreCore::new(router, shards))
    }

    #[derive(Clone, Copy, bytemuck::NoUninit, bytemuck::AnyBitPattern)]
    #[repr(C)]
    struct Hit {
        x: f64,
        y: f64,
        z: f64,
    }

    #[tokio::test]
    async fn store_and_load_round_trip() {
        let store = store_with_shards(1);
        let products = ProductStore::new(store);
        let item = ItemDescriptor::event(Uuid::new_v4(), 36, 42, 13);
        let key = ProductKey::new("mylabel", "hep::Hit");

        assert!(products.load(&item, &key).await.unwrap().is_none());
        products.store(&item, &key, b"payload").await.unwrap();
        assert_eq!(products.load(&item, &key).await.unwrap(), Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn pod_fast_path_round_trips() {
        let store = store_with_shards(1);
        let products = ProductStore::new(store);
        let item = ItemDescriptor::event(Uuid::new_v4(), 1, 4, 32);
        let key = ProductKey::new("mylabel", "hep::Hit");

        let hit = Hit { x: 3.4, y: 4.5, z: 5.6 };
        products.store_pod(&item, &key, &hit).await.unwrap();
        let loaded: Hit = products.load_pod(&item, &key).await.unwrap().unwrap();
        assert_eq!(loaded.x, hit.x);
        assert_eq!(loaded.y, hit.y);
        assert_eq!(loaded.z, hit.z);
    }
}
