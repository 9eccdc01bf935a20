use std::sync::Arc;

use hep_key_codec::dataset_key;
use hep_product_store::ProductStore;
use hep_store_core::{Category, PutOnceOutcome, StoreCore};
use uuid::Uuid;

use crate::dataset::DataSet;
use crate::error::Error;

/// The shared context every handle (`DataSet`, `Run`, `SubRun`, `Event`)
/// holds a strong reference to (§9: "capability-style handle", no cyclic
/// graphs). Cheap to clone; cloning shares the same underlying store and
/// product cache, not a copy of them.
#[derive(Clone)]
pub struct Client {
    store: Arc<StoreCore>,
    products: Arc<ProductStore>,
}

impl Client {
    pub fn new(store: Arc<StoreCore>) -> Self {
        let products = Arc::new(ProductStore::new(store.clone()));
        Self { store, products }
    }

    pub fn store(&self) -> &Arc<StoreCore> {
        &self.store
    }

    pub fn products(&self) -> &Arc<ProductStore> {
        &self.products
    }

    /// Creates a dataset named `name` under `parent_path` (`""` for a
    /// top-level dataset). Idempotent: a second call with the same
    /// `(parent_path, name)` returns a handle to the dataset created by the
    /// first call, with the same UUID, rather than erroring (§8).
    pub async fn create_dataset(&self, parent_path: &str, name: &str) -> Result<DataSet, Error> {
        dataset_key::validate_dataset_name(name)?;
        let key = dataset_key::encode_dataset_key(parent_path, name)?;
        let routing_key = dataset_key::join_path(parent_path, name);
        let routing_key = routing_key.as_bytes();

        let candidate = Uuid::new_v4();
        let uuid = match self
            .store
            .put_once(Category::Dataset, routing_key, &key, candidate.as_bytes())
            .await?
        {
            PutOnceOutcome::Stored => candidate,
            PutOnceOutcome::AlreadyExists => {
                let existing = self
                    .store
                    .get(Category::Dataset, routing_key, &key)
                    .await?
                    .ok_or_else(|| {
                        Error::Store(hep_store_core::Error::Logic(
                            "dataset key reported AlreadyExists but get() returned None".into(),
                        ))
                    })?;
                Uuid::from_slice(&existing)
                    .map_err(|e| Error::InvalidArgument(format!("stored dataset uuid is malformed: {e}")))?
            }
        };

        Ok(DataSet::new(
            self.clone(),
            parent_path.to_string(),
            name.to_string(),
            uuid,
        ))
    }

    /// Opens an existing dataset by its full slash-separated path
    /// (`"matthieu/exp1"`). Returns `None` if no such dataset exists.
    pub async fn open_dataset(&self, path: &str) -> Result<Option<DataSet>, Error> {
        let (parent_path, name) = split_path(path);
        let key = dataset_key::encode_dataset_key(parent_path, name)?;
        let routing_key = path.as_bytes();

        let Some(bytes) = self.store.get(Category::Dataset, routing_key, &key).await? else {
            return Ok(None);
        };
        let uuid = Uuid::from_slice(&bytes)
            .map_err(|e| Error::InvalidArgument(format!("stored dataset uuid is malformed: {e}")))?;
        Ok(Some(DataSet::new(
            self.clone(),
            parent_path.to_string(),
            name.to_string(),
            uuid,
        )))
    }

    /// Reopens a dataset directly from a previously learned UUID, without a
    /// path lookup. The caller is responsible for the UUID being correct;
    /// no existence check is performed since datasets carry no separate
    /// "exists" key besides their own creation record.
    pub fn dataset_handle(&self, parent_path: &str, name: &str, uuid: Uuid) -> DataSet {
        DataSet::new(self.clone(), parent_path.to_string(), name.to_string(), uuid)
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_handles_root_and_nested() {
        assert_eq!(split_path("matthieu"), ("", "matthieu"));
        assert_eq!(split_path("matthieu/exp1"), ("matthieu", "exp1"));
    }
}
