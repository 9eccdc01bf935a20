//! Top-level facade (§6): turns a [`hep_config::Config`] into a working
//! [`hep_hierarchy::Client`] plus the shared [`AsyncEngine`] that
//! `WriteBatch` and the prefetchers run on.
//!
//! Constructing the per-category `KvShard`s from `shards.*` endpoint
//! descriptors is itself out of this crate's core scope (§1 names the
//! server-side provider "an opaque `KvShard`... any mature shard-KV
//! implementation suffices"). No such network provider ships in this
//! workspace, so `StoreClient::connect` wires one in-process
//! [`hep_kv_memory::MemoryShard`] per configured `database_id` -- the same
//! stand-in the rest of the workspace uses for tests and demos. Swapping in
//! a real provider means replacing [`build_shards`] with one that dials
//! `address` and `provider_id` over the wire; nothing above that line
//! changes.

mod error;
mod tree;

use std::collections::HashMap;
use std::sync::Arc;

pub use error::Error;
pub use tree::print_tree;

use hep_async_engine::AsyncEngine;
use hep_cache::ProductCache;
use hep_config::Config;
use hep_hierarchy::Client as HierarchyClient;
use hep_kv_memory::MemoryShard;
use hep_prefetcher::{AsyncPrefetcher, Cursor, SyncPrefetcher};
use hep_shard_router::{Category, ShardRouter};
use hep_store_core::{KvShard, StoreCore};
use hep_write_batch::WriteBatch;

/// A connected client: config-driven routing and storage, a hierarchy
/// handle, and the async engine every batching/prefetching component
/// shares. Cheap to clone.
#[derive(Clone)]
pub struct StoreClient {
    config: Arc<Config>,
    hierarchy: HierarchyClient,
    engine: AsyncEngine,
}

impl StoreClient {
    /// Builds shards and routing from `config` and starts the async engine
    /// (`config.async.threads`, §6.2).
    pub fn connect(config: Config) -> Result<Self, Error> {
        let counts = config.shards.shard_counts();
        let router = ShardRouter::new(counts);
        let shards = build_shards(&config);
        let store = Arc::new(StoreCore::new(router, shards));
        let hierarchy = HierarchyClient::new(store);
        let engine = AsyncEngine::new(config.r#async.threads).map_err(Error::Engine)?;
        Ok(Self {
            config: Arc::new(config),
            hierarchy,
            engine,
        })
    }

    /// Resolves `path`, falling back to `STORE_CONFIG_FILE` (§6.4, §9: read
    /// exactly once per client construction), then connects.
    pub fn connect_from_path_or_env(path: Option<impl AsRef<std::path::Path>>) -> Result<Self, Error> {
        let config = Config::load_from_path_or_env(path)?;
        Self::connect(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hierarchy(&self) -> &HierarchyClient {
        &self.hierarchy
    }

    pub fn engine(&self) -> &AsyncEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<StoreCore> {
        self.hierarchy.store()
    }

    /// A fresh write batch sharing this client's store and engine (§4.4).
    pub fn write_batch(&self) -> WriteBatch {
        WriteBatch::new(self.hierarchy.store().clone(), self.engine.clone())
    }

    /// A bounded-lookahead prefetcher walking `cursor` (§4.3.1). Each call
    /// gets its own cache, matching `SyncPrefetcher`'s single-owner cursor
    /// model.
    pub fn sync_prefetcher(&self, cursor: Cursor) -> SyncPrefetcher {
        SyncPrefetcher::new(
            cursor,
            self.hierarchy.products().clone(),
            Arc::new(ProductCache::new()),
            self.config.prefetch.cache_size,
            self.config.prefetch.batch_size,
        )
    }

    /// A continuously-loading prefetcher (§4.3.2) backed by this client's
    /// engine.
    pub fn async_prefetcher(&self) -> Arc<AsyncPrefetcher> {
        AsyncPrefetcher::new(
            self.hierarchy.products().clone(),
            Arc::new(ProductCache::new()),
            self.engine.clone(),
            self.config.prefetch.cache_size,
            self.config.prefetch.batch_size,
        )
    }
}

/// One `MemoryShard` per configured `database_id`, in the same per-category
/// flatten order `ShardsConfig::shard_counts` summed over -- endpoints in
/// declaration order, then `database_ids` in declaration order within each
/// endpoint -- so shard index `i` here is exactly the index `ShardRouter`
/// assigns for that category.
fn build_shards(config: &Config) -> HashMap<Category, Vec<Arc<dyn KvShard>>> {
    let mut shards = HashMap::new();
    shards.insert(Category::Dataset, flatten(&config.shards.datasets));
    shards.insert(Category::Run, flatten(&config.shards.runs));
    shards.insert(Category::SubRun, flatten(&config.shards.subruns));
    shards.insert(Category::Event, flatten(&config.shards.events));
    shards.insert(Category::Product, flatten(&config.shards.products));
    shards
}

fn flatten(endpoints: &[hep_config::EndpointConfig]) -> Vec<Arc<dyn KvShard>> {
    endpoints
        .iter()
        .flat_map(|endpoint| endpoint.database_ids.iter())
        .map(|_database_id| Arc::new(MemoryShard::new()) as Arc<dyn KvShard>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_config::EndpointConfig;

    fn sample_config() -> Config {
        let mut config = Config::default();
        config.shards.events = vec![EndpointConfig {
            address: "127.0.0.1:9000".into(),
            provider_id: "p0".into(),
            database_ids: vec!["a".into(), "b".into()],
        }];
        config.shards.datasets = vec![EndpointConfig {
            address: "127.0.0.1:9001".into(),
            provider_id: "p1".into(),
            database_ids: vec!["c".into()],
        }];
        config
    }

    #[tokio::test]
    async fn connect_wires_a_usable_client() {
        let client = StoreClient::connect(sample_config()).unwrap();
        let dataset = client.hierarchy().create_dataset("", "demo").await.unwrap();
        assert_eq!(dataset.name(), "demo");
        let reopened = client.hierarchy().open_dataset("demo").await.unwrap();
        assert_eq!(reopened.unwrap().uuid(), dataset.uuid());
    }

    #[test]
    fn shard_counts_match_built_shard_lists() {
        let config = sample_config();
        let counts = config.shards.shard_counts();
        let shards = build_shards(&config);
        for category in Category::ALL {
            assert_eq!(counts[&category], shards[&category].len());
        }
    }
}
