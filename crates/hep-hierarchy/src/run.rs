use hep_key_codec::{ItemDescriptor, Level, ProductKey, RunNumber, SubRunNumber, SUBRUN_SENTINEL};
use hep_store_core::{Category, PutOnceOutcome};
use uuid::Uuid;

use crate::client::Client;
use crate::cursor::Cursor;
use crate::error::Error;
use crate::subrun::SubRun;

/// A handle to one Run within a dataset.
#[derive(Clone)]
pub struct Run {
    client: Client,
    descriptor: ItemDescriptor,
}

impl Run {
    pub(crate) fn new(client: Client, descriptor: ItemDescriptor) -> Self {
        debug_assert_eq!(descriptor.level(), Level::Run);
        Self { client, descriptor }
    }

    pub fn dataset_uuid(&self) -> Uuid {
        self.descriptor.dataset
    }

    pub fn number(&self) -> RunNumber {
        self.descriptor.run
    }

    pub fn descriptor(&self) -> ItemDescriptor {
        self.descriptor
    }

    pub async fn create_subrun(&self, number: SubRunNumber) -> Result<SubRun, Error> {
        if number == SUBRUN_SENTINEL {
            return Err(Error::InvalidArgument(format!(
                "subrun number {number} is the sentinel value and cannot be created"
            )));
        }
        let descriptor = ItemDescriptor::subrun(self.descriptor.dataset, self.descriptor.run, number);
        let key = descriptor.encode(Level::SubRun);
        match self
            .client
            .store()
            .put_once(Category::SubRun, self.descriptor.dataset.as_bytes(), &key, &[])
            .await?
        {
            PutOnceOutcome::Stored | PutOnceOutcome::AlreadyExists => {}
        }
        Ok(SubRun::new(self.client.clone(), descriptor))
    }

    pub async fn find_subrun(&self, number: SubRunNumber) -> Result<Option<SubRun>, Error> {
        let descriptor = ItemDescriptor::subrun(self.descriptor.dataset, self.descriptor.run, number);
        let key = descriptor.encode(Level::SubRun);
        let found = self
            .client
            .store()
            .exists(Category::SubRun, self.descriptor.dataset.as_bytes(), &key)
            .await?;
        Ok(found.then(|| SubRun::new(self.client.clone(), descriptor)))
    }

    /// A forward cursor over this run's subruns, in ascending order (§4.2).
    pub fn subruns(&self) -> Cursor {
        Cursor::over_children(self.client.store().clone(), self.descriptor)
            .expect("run level always has a subrun child level")
    }

    pub async fn store_product(&self, product: &ProductKey, value: &[u8]) -> Result<(), Error> {
        Ok(self.client.products().store(&self.descriptor, product, value).await?)
    }

    pub async fn load_product(&self, product: &ProductKey) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.client.products().load(&self.descriptor, product).await?)
    }

    pub async fn list_products(&self) -> Result<Vec<ProductKey>, Error> {
        Ok(self.client.products().list(&self.descriptor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use hep_kv_memory::MemoryShard;
    use hep_store_core::StoreCore;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn client_with_shards() -> Client {
        let mut counts = HashMap::new();
        for c in hep_store_core::Category::ALL {
            counts.insert(c, 1);
        }
        let router = hep_shard_router::ShardRouter::new(counts);
        let mut shards: HashMap<Category, Vec<Arc<dyn hep_store_core::KvShard>>> = HashMap::new();
        for c in hep_store_core::Category::ALL {
            shards.insert(c, vec![Arc::new(MemoryShard::new()) as Arc<dyn hep_store_core::KvShard>]);
        }
        Client::new(Arc::new(StoreCore::new(router, shards)))
    }

    #[tokio::test]
    async fn create_subrun_rejects_the_sentinel_subrun_number() {
        let client = client_with_shards();
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        let run = dataset.create_run(1).await.unwrap();
        let err = run.create_subrun(SUBRUN_SENTINEL).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
