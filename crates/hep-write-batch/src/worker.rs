use std::collections::HashMap;
use std::sync::Arc;

use hep_store_core::{Category, StoreCore};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::drain::{flush_shard, Error, Kind, PendingEntry};

enum Message {
    Write(PendingEntry),
    Flush(oneshot::Sender<Result<(), Error>>),
}

/// A continuously-draining write batch: one background task owns an
/// unbounded channel of incoming writes and flushes them as soon as
/// `flush()` asks it to, rather than the caller driving the flush itself
/// (§4.4). Submitting a write never waits on a shard round-trip; only
/// `flush()` does.
pub struct AsyncWriteBatch {
    tx: mpsc::UnboundedSender<Message>,
    store: Arc<StoreCore>,
    worker: JoinHandle<()>,
}

impl AsyncWriteBatch {
    pub fn spawn(store: Arc<StoreCore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(Self::drain_loop(store.clone(), rx));
        Self { tx, store, worker }
    }

    fn route(&self, category: Category, routing_key: &[u8]) -> Result<usize, Error> {
        Ok(self.store.router().route(category, routing_key)?)
    }

    pub fn put_item(&self, category: Category, routing_key: &[u8], key: &[u8]) -> Result<(), Error> {
        let shard_index = self.route(category, routing_key)?;
        self.send(PendingEntry {
            category,
            shard_index,
            key: key.to_vec(),
            value: Vec::new(),
            kind: Kind::Item,
        })
    }

    pub fn put_product(&self, routing_key: &[u8], key: &[u8], value: &[u8]) -> Result<(), Error> {
        let shard_index = self.route(Category::Product, routing_key)?;
        self.send(PendingEntry {
            category: Category::Product,
            shard_index,
            key: key.to_vec(),
            value: value.to_vec(),
            kind: Kind::Product,
        })
    }

    fn send(&self, entry: PendingEntry) -> Result<(), Error> {
        self.tx.send(Message::Write(entry)).map_err(|_| Error::WorkerGone)
    }

    /// Signals end-of-input for everything submitted before this call and
    /// awaits the drain. Writes submitted concurrently may land in this
    /// flush or the next one, same as [`crate::WriteBatch::flush`].
    pub async fn flush(&self) -> Result<(), Error> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::Flush(reply_tx))
            .map_err(|_| Error::WorkerGone)?;
        reply_rx.await.map_err(|_| Error::WorkerGone)?
    }

    async fn drain_loop(store: Arc<StoreCore>, mut rx: mpsc::UnboundedReceiver<Message>) {
        let mut groups: HashMap<(Category, usize), Vec<PendingEntry>> = HashMap::new();
        while let Some(message) = rx.recv().await {
            match message {
                Message::Write(entry) => {
                    groups.entry((entry.category, entry.shard_index)).or_default().push(entry);
                }
                Message::Flush(reply) => {
                    let pending = std::mem::take(&mut groups);
                    let result = Self::flush_all(&store, pending).await;
                    let _ = reply.send(result);
                }
            }
        }
    }

    async fn flush_all(
        store: &StoreCore,
        groups: HashMap<(Category, usize), Vec<PendingEntry>>,
    ) -> Result<(), Error> {
        let mut first_err = None;
        for ((category, shard_index), entries) in groups {
            if let Err(e) = flush_shard(store, category, shard_index, entries, true).await {
                tracing::error!(error = %e, ?category, shard_index, "write batch flush failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for AsyncWriteBatch {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
