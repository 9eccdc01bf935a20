use std::sync::Arc;
use std::time::Instant;

use hep_async_engine::{AsyncEngine, EngineError};
use hep_cache::ProductCache;
use hep_hierarchy::{Client, Event};
use hep_key_codec::{encode_product_key, ItemDescriptor, Level, ProductKey};
use hep_store_core::{Category, StoreCore};
use mpi::Rank;
use uuid::Uuid;

use crate::error::Error;
use crate::loader::LocalLoader;
use crate::roles::{assign_role, loader_ranks, rotation_for, Role};
use crate::stats::ProcessorStats;
use crate::transport::Transport;

/// Shard scan page size for a loader's owned-shard sweep. Unrelated to the
/// prefetcher's `batch_size`; this paginates a raw `list_range_on_shard`
/// scan, not a cursor over one dataset's own shard.
const SCAN_BATCH: usize = 64;

/// Distributes one dataset's events to a user callback across an MPI
/// communicator, balancing load between ranks that own event shards and
/// ranks that don't (§4.5).
pub struct ParallelEventProcessor {
    transport: Transport,
    store: Arc<StoreCore>,
    client: Client,
    dataset: Uuid,
    role: Role,
    loader_ranks: Vec<Rank>,
    rotation: Vec<Rank>,
    local_loader: Option<Arc<LocalLoader>>,
    active_products: Vec<ProductKey>,
    cache: Arc<ProductCache>,
    engine: AsyncEngine,
}

impl ParallelEventProcessor {
    /// Verifies every rank targets the same dataset (`MPI_Allreduce(BAND)`
    /// over its UUID bytes), then computes this rank's role. A `MPI_Barrier`
    /// brackets construction so no rank starts `process()` before every
    /// peer has agreed on the dataset.
    pub fn new(
        transport: Transport,
        store: Arc<StoreCore>,
        engine: AsyncEngine,
        dataset: Uuid,
    ) -> Result<Self, Error> {
        transport.barrier();
        let local = dataset.as_u128();
        let reduced = transport.verify_same_dataset(local);
        if reduced != local {
            tracing::error!(rank = transport.rank(), %dataset, "dataset mismatch across ranks");
            return Err(Error::DatasetMismatch { local, reduced });
        }

        let total_event_shards = store.shard_count(Category::Event);
        let role = assign_role(total_event_shards, transport.size(), transport.rank());
        let loaders = loader_ranks(total_event_shards, transport.size());
        let rotation = rotation_for(transport.rank(), &loaders);

        let local_loader = match &role {
            Role::Loader { .. } => {
                let expected_consumers = (transport.size() as usize).saturating_sub(1);
                Some(Arc::new(LocalLoader::new_with_expected_consumers(expected_consumers)))
            }
            Role::Consumer => None,
        };

        let client = Client::new(store.clone());
        Ok(Self {
            transport,
            store,
            client,
            dataset,
            role,
            loader_ranks: loaders,
            rotation,
            local_loader,
            active_products: Vec::new(),
            cache: Arc::new(ProductCache::new()),
            engine,
        })
    }

    /// Registers a product to preload for every event delivered to
    /// `process`'s callback (§4.5 "Preloading"). Call before `process`.
    pub fn preload(&mut self, product: ProductKey) {
        self.active_products.push(product);
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Runs `f` over every event belonging to this dataset, across every
    /// rank, until this rank's rotation is exhausted. Collective: every
    /// rank in the communicator must call `process()` for any rank to make
    /// progress, since loaders answer remote requests from within it.
    pub async fn process<F>(&self, mut f: F) -> Result<ProcessorStats, Error>
    where
        F: FnMut(Event, &ProductCache),
    {
        let start = Instant::now();
        let mut stats = ProcessorStats::default();

        if let Some(local_loader) = self.local_loader.clone() {
            self.spawn_loading_task(local_loader.clone());
            self.spawn_responder_task(local_loader);
        }

        let mut rotation = self.rotation.clone();

        while !rotation.is_empty() {
            let loader = rotation[0];
            let is_local = loader == self.transport.rank();

            let load_start = Instant::now();
            let item = if is_local {
                self.local_loader
                    .as_ref()
                    .expect("this rank's own rank is only in the rotation when it owns a loader")
                    .pop()
                    .await
            } else {
                self.request_remote(loader).await?
            };
            // Time spent blocked waiting for this event (local FIFO pop or
            // remote Tag R/E round trip) doubles as both "loading time" and
            // the inter-event waiting gap (§4.5 "Statistics"): nothing else
            // happens between delivering one event and requesting the next.
            let waited = load_start.elapsed();

            match item {
                Some(descriptor) => {
                    self.preload_active_products(&descriptor).await?;
                    let event = Event::from_descriptor(self.client.clone(), descriptor);

                    let t0 = Instant::now();
                    f(event, &self.cache);
                    let processing = t0.elapsed();

                    stats.record_event(is_local, processing, waited);
                    stats.record_loading(waited);
                    let len = rotation.len();
                    rotation.rotate_left(1.min(len));
                }
                None => {
                    tracing::debug!(rank = self.transport.rank(), loader, "loader exhausted, leaving rotation");
                    rotation.remove(0);
                }
            }
        }

        stats.wall_clock_total = start.elapsed();
        self.engine.wait().await?;
        self.transport.barrier();
        tracing::debug!(
            rank = self.transport.rank(),
            total = stats.total_events,
            local = stats.events_processed_locally,
            "process() complete"
        );
        Ok(stats)
    }

    fn spawn_loading_task(&self, local_loader: Arc<LocalLoader>) {
        let Role::Loader { owned_shards } = &self.role else {
            return;
        };
        let owned_shards = owned_shards.clone();
        let store = self.store.clone();
        let dataset = self.dataset;

        self.engine.spawn(async move {
            for shard_index in owned_shards {
                let mut start: Option<Vec<u8>> = None;
                loop {
                    let hits = store
                        .list_range_on_shard(
                            Category::Event,
                            shard_index,
                            start.as_deref(),
                            dataset.as_bytes(),
                            SCAN_BATCH,
                        )
                        .await
                        .map_err(EngineError::from_display)?;
                    if hits.is_empty() {
                        break;
                    }
                    let short_read = hits.len() < SCAN_BATCH;
                    for bytes in &hits {
                        let descriptor =
                            ItemDescriptor::decode(Level::Event, bytes).map_err(EngineError::from_display)?;
                        local_loader.push(descriptor);
                    }
                    start = hits.last().cloned();
                    if short_read {
                        break;
                    }
                }
            }
            local_loader.mark_finished();
            Ok(())
        });
    }

    fn spawn_responder_task(&self, local_loader: Arc<LocalLoader>) {
        let transport = self.transport.clone();
        self.engine.spawn(async move {
            while local_loader.active_consumers() > 0 {
                let transport_for_recv = transport.clone();
                let requester = tokio::task::spawn_blocking(move || transport_for_recv.recv_request())
                    .await
                    .map_err(EngineError::from_display)?;

                let item = local_loader.pop().await;
                let transport_for_send = transport.clone();
                let reply_item = item;
                tokio::task::spawn_blocking(move || transport_for_send.send_event(requester, reply_item))
                    .await
                    .map_err(EngineError::from_display)?;

                if item.is_none() {
                    local_loader.deregister_consumer();
                }
            }
            Ok(())
        });
    }

    async fn request_remote(&self, loader: Rank) -> Result<Option<ItemDescriptor>, Error> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || {
            transport.send_request(loader);
            transport.recv_event(loader)
        })
        .await
        .map_err(|e| Error::WorkerGone(e.to_string()))
    }

    async fn preload_active_products(&self, descriptor: &ItemDescriptor) -> Result<(), Error> {
        for product in &self.active_products {
            let key = encode_product_key(descriptor, product);
            match self.client.products().load(descriptor, product).await? {
                Some(value) => self.cache.insert(key, value),
                None => self.cache.mark_not_found(key),
            }
        }
        Ok(())
    }
}
