use std::collections::HashSet;

use hep_store_core::{Category, StoreCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A Dataset/Run/SubRun/Event creation key. Idempotent: a duplicate
    /// submission within one flush is simply dropped.
    Item,
    /// A product value, an unconditional upsert. In async-drain flushes a
    /// duplicate submission within one flush is a caller error; the
    /// synchronous flush has no such check (§4.4).
    Product,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] hep_store_core::Error),
    #[error(transparent)]
    Routing(#[from] hep_shard_router::Error),
    #[error(transparent)]
    Engine(#[from] hep_async_engine::EngineError),
    #[error("product key written twice in the same flush: {0:?}")]
    DuplicateProduct(Vec<u8>),
    #[error("write batch worker task is no longer running")]
    WorkerGone,
}

pub(crate) struct PendingEntry {
    pub category: Category,
    pub shard_index: usize,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub kind: Kind,
}

/// Applies one shard's worth of pending entries: deduplicates within the
/// group per [`Kind`]'s rule, then issues a single `put_multi` against that
/// shard. Shared by both [`crate::WriteBatch`] and [`crate::AsyncWriteBatch`],
/// which differ only in `detect_duplicate_products` (§4.4: the duplicate-
/// product-is-an-error check is an async-drain-only policy; the synchronous
/// flush just calls `put_multi` with no such check).
pub(crate) async fn flush_shard(
    store: &StoreCore,
    category: Category,
    shard_index: usize,
    entries: Vec<PendingEntry>,
    detect_duplicate_products: bool,
) -> Result<(), Error> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut batch = Vec::with_capacity(entries.len());
    let mut first_err = None;

    for entry in entries {
        if !seen.insert(entry.key.clone()) {
            match entry.kind {
                Kind::Item => continue,
                Kind::Product if detect_duplicate_products => {
                    tracing::warn!(key = ?entry.key, "duplicate product write within one flush");
                    first_err.get_or_insert(Error::DuplicateProduct(entry.key));
                    continue;
                }
                Kind::Product => {}
            }
        }
        batch.push((entry.key, entry.value));
    }

    store.put_multi_on_shard(category, shard_index, &batch).await?;

    first_err.map_or(Ok(()), Err)
}
