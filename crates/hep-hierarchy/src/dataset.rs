use hep_key_codec::{dataset_key, ItemDescriptor, ProductKey, RunNumber, RUN_SENTINEL};
use hep_store_core::{Category, PutOnceOutcome};
use uuid::Uuid;

use crate::client::Client;
use crate::cursor::Cursor;
use crate::error::Error;
use crate::run::Run;

/// A handle to one DataSet: a named, permanent collection of Runs,
/// identified by both its path (`parent_path` + `name`) and a UUID minted
/// at creation (§3.1). The UUID, not the path, is what every Run/SubRun/
/// Event descriptor under this dataset actually carries and routes by.
#[derive(Clone)]
pub struct DataSet {
    client: Client,
    parent_path: String,
    name: String,
    uuid: Uuid,
}

impl DataSet {
    pub(crate) fn new(client: Client, parent_path: String, name: String, uuid: Uuid) -> Self {
        Self {
            client,
            parent_path,
            name,
            uuid,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    pub fn path(&self) -> String {
        dataset_key::join_path(&self.parent_path, &self.name)
    }

    fn descriptor(&self) -> ItemDescriptor {
        ItemDescriptor::dataset(self.uuid)
    }

    pub(crate) fn client_handle(&self) -> Client {
        self.client.clone()
    }

    /// Creates run `number` under this dataset. Idempotent: creating an
    /// already-existing run number returns a handle to it rather than
    /// erroring (§3.3, §8).
    pub async fn create_run(&self, number: RunNumber) -> Result<Run, Error> {
        if number == RUN_SENTINEL {
            return Err(Error::InvalidArgument(format!(
                "run number {number} is the sentinel value and cannot be created"
            )));
        }
        let descriptor = ItemDescriptor::run(self.uuid, number);
        let key = descriptor.encode(hep_key_codec::Level::Run);
        match self
            .client
            .store()
            .put_once(Category::Run, self.uuid.as_bytes(), &key, &[])
            .await?
        {
            PutOnceOutcome::Stored | PutOnceOutcome::AlreadyExists => {}
        }
        Ok(Run::new(self.client.clone(), descriptor))
    }

    /// Opens run `number` if it has been created, `None` otherwise.
    pub async fn find_run(&self, number: RunNumber) -> Result<Option<Run>, Error> {
        let descriptor = ItemDescriptor::run(self.uuid, number);
        let key = descriptor.encode(hep_key_codec::Level::Run);
        let found = self
            .client
            .store()
            .exists(Category::Run, self.uuid.as_bytes(), &key)
            .await?;
        Ok(found.then(|| Run::new(self.client.clone(), descriptor)))
    }

    /// A forward cursor over every run created under this dataset, in
    /// ascending run-number order (§4.2).
    pub fn runs(&self) -> Cursor {
        Cursor::over_children(self.client.store().clone(), self.descriptor())
            .expect("dataset level always has a run child level")
    }

    pub async fn store_product(&self, product: &ProductKey, value: &[u8]) -> Result<(), Error> {
        Ok(self.client.products().store(&self.descriptor(), product, value).await?)
    }

    pub async fn load_product(&self, product: &ProductKey) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.client.products().load(&self.descriptor(), product).await?)
    }

    pub async fn list_products(&self) -> Result<Vec<ProductKey>, Error> {
        Ok(self.client.products().list(&self.descriptor()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
    async fn create_run_is_idempotent() {
        let client = client_with_shards();
        let dataset = client.create_dataset("", "matthieu").await.unwrap();

        let first = dataset.create_run(36).await.unwrap();
        let second = dataset.create_run(36).await.unwrap();
        assert_eq!(first.number(), second.number());
        assert_eq!(first.dataset_uuid(), second.dataset_uuid());
    }

    #[tokio::test]
    async fn create_dataset_twice_returns_the_same_uuid() {
        let client = client_with_shards();
        let a = client.create_dataset("", "matthieu").await.unwrap();
        let b = client.create_dataset("", "matthieu").await.unwrap();
        assert_eq!(a.uuid(), b.uuid());
    }

    #[tokio::test]
    async fn find_run_only_sees_created_runs() {
        let client = client_with_shards();
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        assert!(dataset.find_run(1).await.unwrap().is_none());
        dataset.create_run(1).await.unwrap();
        assert!(dataset.find_run(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_run_rejects_the_sentinel_run_number() {
        let client = client_with_shards();
        let dataset = client.create_dataset("", "matthieu").await.unwrap();
        let err = dataset.create_run(hep_key_codec::RUN_SENTINEL).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
