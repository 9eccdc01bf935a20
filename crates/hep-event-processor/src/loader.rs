//! A loader rank's local state (§4.5 "Local loader state"): a bounded FIFO
//! fed by a background task and drained by both this rank's own consumer
//! loop and the responder task answering remote Tag R requests. The
//! wait/notify shape mirrors `hep_queue::Queue::pop` and
//! `hep_prefetcher::AsyncPrefetcher`'s loader loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use hep_key_codec::ItemDescriptor;
use parking_lot::Mutex;
use tokio::sync::Notify;

struct Data {
    fifo: VecDeque<ItemDescriptor>,
    running: bool,
}

pub struct LocalLoader {
    data: Mutex<Data>,
    notify: Notify,
    active_consumers: AtomicUsize,
}

impl LocalLoader {
    pub fn new() -> Self {
        Self::new_with_expected_consumers(0)
    }

    /// `expected_consumers` is the number of distinct remote ranks that
    /// will ever send this loader a Tag R request -- every other rank in
    /// the communicator, since every rank's rotation covers every loader
    /// (§4.5 "Consumer loop"). Known up front from `(P, rank)` alone, so
    /// no registration handshake is needed.
    pub fn new_with_expected_consumers(expected_consumers: usize) -> Self {
        Self {
            data: Mutex::new(Data {
                fifo: VecDeque::new(),
                running: true,
            }),
            notify: Notify::new(),
            active_consumers: AtomicUsize::new(expected_consumers),
        }
    }

    /// Appends an event descriptor fetched by the loading task, waking one
    /// waiter (either the local consumer loop or the responder task).
    pub fn push(&self, item: ItemDescriptor) {
        self.data.lock().fifo.push_back(item);
        self.notify.notify_one();
    }

    /// Signals that the loading task has exhausted its owned shards; any
    /// further `pop` sees an empty FIFO and returns `None` instead of
    /// waiting.
    pub fn mark_finished(&self) {
        self.data.lock().running = false;
        self.notify.notify_waiters();
    }

    /// Blocks until an event is available or the loading task has finished
    /// and the FIFO is drained.
    pub async fn pop(&self) -> Option<ItemDescriptor> {
        loop {
            {
                let mut data = self.data.lock();
                if let Some(item) = data.fifo.pop_front() {
                    return Some(item);
                }
                if !data.running {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn register_consumer(&self) {
        self.active_consumers.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number of consumers still registered after this one
    /// leaves. The responder loop exits once this reaches zero.
    pub fn deregister_consumer(&self) -> usize {
        self.active_consumers.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn active_consumers(&self) -> usize {
        self.active_consumers.load(Ordering::SeqCst)
    }
}

impl Default for LocalLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn event(n: u64) -> ItemDescriptor {
        ItemDescriptor::event(Uuid::from_bytes([1; 16]), 0, 0, n)
    }

    #[tokio::test]
    async fn pop_waits_for_a_later_push() {
        let loader = std::sync::Arc::new(LocalLoader::new());
        let waiter = tokio::spawn({
            let loader = loader.clone();
            async move { loader.pop().await }
        });
        tokio::task::yield_now().await;
        loader.push(event(7));
        assert_eq!(waiter.await.unwrap(), Some(event(7)));
    }

    #[tokio::test]
    async fn pop_returns_queued_items_in_order() {
        let loader = LocalLoader::new();
        loader.push(event(1));
        loader.push(event(2));
        assert_eq!(loader.pop().await, Some(event(1)));
        assert_eq!(loader.pop().await, Some(event(2)));
    }

    #[tokio::test]
    async fn pop_returns_none_once_finished_and_drained() {
        let loader = LocalLoader::new();
        loader.push(event(1));
        loader.mark_finished();
        assert_eq!(loader.pop().await, Some(event(1)));
        assert_eq!(loader.pop().await, None);
    }

    #[tokio::test]
    async fn consumer_registration_tracks_active_count() {
        let loader = LocalLoader::new();
        loader.register_consumer();
        loader.register_consumer();
        assert_eq!(loader.active_consumers(), 2);
        assert_eq!(loader.deregister_consumer(), 1);
        assert_eq!(loader.active_consumers(), 1);
    }
}
