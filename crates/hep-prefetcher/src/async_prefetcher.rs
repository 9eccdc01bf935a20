use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hep_async_engine::{AsyncEngine, EngineError};
use hep_cache::ProductCache;
use hep_hierarchy::Cursor;
use hep_key_codec::{encode_product_key, ItemDescriptor, ProductKey};
use hep_product_store::ProductStore;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::Error;

struct State {
    item_cache: VecDeque<ItemDescriptor>,
}

/// A continuously-loading prefetcher (§4.3.2): a single background task
/// ("the loader") keeps the lookahead window full while the caller consumes
/// it, instead of the caller driving each refill itself.
pub struct AsyncPrefetcher {
    state: Mutex<State>,
    notify: Notify,
    loader_active: AtomicBool,
    cache_size: usize,
    batch_size: usize,
    active_products: Vec<ProductKey>,
    products: Arc<ProductStore>,
    cache: Arc<ProductCache>,
    engine: AsyncEngine,
}

impl AsyncPrefetcher {
    pub fn new(
        products: Arc<ProductStore>,
        cache: Arc<ProductCache>,
        engine: AsyncEngine,
        cache_size: usize,
        batch_size: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                item_cache: VecDeque::with_capacity(cache_size),
            }),
            notify: Notify::new(),
            loader_active: AtomicBool::new(false),
            cache_size,
            batch_size,
            active_products: Vec::new(),
            products,
            cache,
            engine,
        })
    }

    pub fn preload(self: &mut Arc<Self>, product: ProductKey) {
        Arc::get_mut(self)
            .expect("preload must be called before prefetch_from spawns the loader")
            .active_products
            .push(product);
    }

    pub fn cache(&self) -> &Arc<ProductCache> {
        &self.cache
    }

    /// Spawns the loader task over `cursor`, if one isn't already running.
    pub fn prefetch_from(self: &Arc<Self>, cursor: Cursor) {
        if self
            .loader_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let this = self.clone();
        self.engine.spawn(async move {
            this.loader_loop(cursor).await.map_err(EngineError::from_display)
        });
    }

    async fn loader_loop(&self, mut cursor: Cursor) -> Result<(), Error> {
        loop {
            loop {
                let full = self.state.lock().item_cache.len() >= self.cache_size;
                if !full || !self.loader_active.load(Ordering::SeqCst) {
                    break;
                }
                self.notify.notified().await;
            }
            if !self.loader_active.load(Ordering::SeqCst) {
                break;
            }

            let batch = cursor.next_batch(self.batch_size).await?;
            if batch.is_empty() {
                self.loader_active.store(false, Ordering::SeqCst);
                self.notify.notify_waiters();
                break;
            }

            for item in &batch {
                self.preload_one(item).await?;
                self.state.lock().item_cache.push_back(*item);
                self.notify.notify_waiters();
            }
        }
        Ok(())
    }

    async fn preload_one(&self, item: &ItemDescriptor) -> Result<(), Error> {
        for product in &self.active_products {
            let key = encode_product_key(item, product);
            if !self.cache.begin_loading(&key) {
                continue;
            }
            match self.products.load(item, product).await? {
                Some(value) => self.cache.insert(key, value),
                None => self.cache.mark_not_found(key),
            }
        }
        Ok(())
    }

    /// Waits until either an item strictly greater than `current` is
    /// available or the loader has run out of work, then returns up to
    /// `max` such items, removing them from the window.
    pub async fn next_items(&self, current: ItemDescriptor, max: usize) -> Vec<ItemDescriptor> {
        loop {
            {
                let mut state = self.state.lock();
                let available = state.item_cache.iter().filter(|d| **d > current).count();
                if available > 0 || !self.loader_active.load(Ordering::SeqCst) {
                    let mut out = Vec::with_capacity(max.min(available));
                    while out.len() < max {
                        match state.item_cache.front() {
                            Some(d) if *d > current => out.push(state.item_cache.pop_front().unwrap()),
                            _ => break,
                        }
                    }
                    drop(state);
                    if !out.is_empty() {
                        self.notify.notify_waiters();
                    }
                    return out;
                }
            }
            self.notify.notified().await;
        }
    }
}

impl Drop for AsyncPrefetcher {
    fn drop(&mut self) {
        self.loader_active.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
