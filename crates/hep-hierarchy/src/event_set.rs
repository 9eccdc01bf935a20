//! Direct multi-shard event enumeration (§4.2, "Event enumeration across
//! targets"): events for a dataset live on every Event-category shard, one
//! per UUID partition, independent of the Run/SubRun tree above them. This
//! walks the Event shards themselves rather than the Run → SubRun → Event
//! cursor chain, matching the original implementation's per-target
//! iteration (`nextItems(EVENT, DATASET, ...)` against a shard index,
//! `m_target`/`m_num_targets`).

use hep_key_codec::{ItemDescriptor, Level};
use hep_store_core::Category;
use uuid::Uuid;

use crate::client::Client;
use crate::dataset::DataSet;
use crate::error::Error;
use crate::event::Event;

/// A forward-only enumerator over every event belonging to one dataset,
/// scanning Event shards directly in ascending shard-index order (or a
/// single shard, if restricted).
pub struct EventSet {
    client: Client,
    dataset: Uuid,
    shards: Vec<usize>,
    shard_pos: usize,
    current: Option<ItemDescriptor>,
}

impl EventSet {
    /// Iterates every Event-category shard, in ascending index order.
    pub fn new(dataset: &DataSet) -> Self {
        let client = dataset.client_handle();
        let shard_count = client.store().shard_count(Category::Event);
        Self {
            dataset: dataset.uuid(),
            shards: (0..shard_count).collect(),
            client,
            shard_pos: 0,
            current: None,
        }
    }

    /// Restricted to a single Event shard, for callers that already know
    /// which shard they own (the parallel event processor's per-rank scan).
    pub fn for_shard(dataset: &DataSet, shard_index: usize) -> Self {
        Self {
            dataset: dataset.uuid(),
            shards: vec![shard_index],
            client: dataset.client_handle(),
            shard_pos: 0,
            current: None,
        }
    }

    /// Returns the next event in shard-ascending order, or `None` once
    /// every shard this set covers has been exhausted.
    pub async fn next(&mut self) -> Result<Option<Event>, Error> {
        loop {
            let Some(&shard_index) = self.shards.get(self.shard_pos) else {
                return Ok(None);
            };
            let found = match self.current {
                None => self.seek_first(shard_index).await?,
                Some(current) => self.seek_next(shard_index, &current).await?,
            };
            match found {
                Some(descriptor) => {
                    self.current = Some(descriptor);
                    return Ok(Some(Event::new(self.client.clone(), descriptor)));
                }
                None => {
                    self.shard_pos += 1;
                    self.current = None;
                }
            }
        }
    }

    /// Seeks `(uuid, 0, 0, 0)` on `shard_index`: emit it if present,
    /// otherwise the smallest item under the dataset's prefix on that shard.
    async fn seek_first(&self, shard_index: usize) -> Result<Option<ItemDescriptor>, Error> {
        let origin = ItemDescriptor::event(self.dataset, 0, 0, 0);
        let key = origin.encode(Level::Event);
        if self
            .client
            .store()
            .exists_on_shard(Category::Event, shard_index, &key)
            .await?
        {
            return Ok(Some(origin));
        }
        let hits = self
            .client
            .store()
            .list_range_on_shard(Category::Event, shard_index, None, self.dataset.as_bytes(), 1)
            .await?;
        Self::decode_first(&hits)
    }

    async fn seek_next(&self, shard_index: usize, current: &ItemDescriptor) -> Result<Option<ItemDescriptor>, Error> {
        let key = current.encode(Level::Event);
        let hits = self
            .client
            .store()
            .list_range_on_shard(Category::Event, shard_index, Some(&key), self.dataset.as_bytes(), 1)
            .await?;
        Self::decode_first(&hits)
    }

    fn decode_first(hits: &[Vec<u8>]) -> Result<Option<ItemDescriptor>, Error> {
        match hits.first() {
            Some(bytes) => Ok(Some(ItemDescriptor::decode(Level::Event, bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hep_store_core::{KvShard, StoreCore};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn client_with_shards(event_shards: usize) -> Client {
        let mut counts = HashMap::new();
        for c in hep_store_core::Category::ALL {
            counts.insert(c, 1);
        }
        counts.insert(Category::Event, event_shards);
        let router = hep_shard_router::ShardRouter::new(counts);
        let mut shards: HashMap<Category, Vec<Arc<dyn KvShard>>> = HashMap::new();
        for c in hep_store_core::Category::ALL {
            let n = if c == Category::Event { event_shards } else { 1 };
            shards.insert(
                c,
                (0..n).map(|_| Arc::new(hep_kv_memory::MemoryShard::new()) as Arc<dyn KvShard>).collect(),
            );
        }
        Client::new(Arc::new(StoreCore::new(router, shards)))
    }

    #[tokio::test]
    async fn enumerates_events_across_shards_in_order() {
        let client = client_with_shards(2);
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        let run = dataset.create_run(1).await.unwrap();
        let subrun = run.create_subrun(1).await.unwrap();
        for e in [0u64, 1, 2, 3, 4] {
            subrun.create_event(e).await.unwrap();
        }

        let mut set = EventSet::new(&dataset);
        let mut seen = Vec::new();
        while let Some(event) = set.next().await.unwrap() {
            seen.push(event.descriptor().event);
        }
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn empty_dataset_yields_no_events() {
        let client = client_with_shards(1);
        let dataset = client.create_dataset("", "empty").await.unwrap();
        let mut set = EventSet::new(&dataset);
        assert!(set.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn for_shard_restricts_to_a_single_shard() {
        let client = client_with_shards(2);
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        let run = dataset.create_run(1).await.unwrap();
        let subrun = run.create_subrun(1).await.unwrap();
        for e in [0u64, 1, 2] {
            subrun.create_event(e).await.unwrap();
        }

        let mut total = 0;
        for shard in 0..2 {
            let mut set = EventSet::for_shard(&dataset, shard);
            while set.next().await.unwrap().is_some() {
                total += 1;
            }
        }
        assert_eq!(total, 3);
    }
}
