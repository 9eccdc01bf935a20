use hep_key_codec::{EventNumber, ItemDescriptor, Level, ProductKey, RunNumber, SubRunNumber};
use uuid::Uuid;

use crate::client::Client;
use crate::error::Error;

/// A handle to one Event: the leaf level of the hierarchy, and the unit
/// products are most commonly attached to.
#[derive(Clone)]
pub struct Event {
    client: Client,
    descriptor: ItemDescriptor,
}

impl Event {
    pub(crate) fn new(client: Client, descriptor: ItemDescriptor) -> Self {
        debug_assert_eq!(descriptor.level(), Level::Event);
        Self { client, descriptor }
    }

    /// Builds a handle directly from an already-known descriptor, without a
    /// lookup. Used by the parallel event processor (§4.5), which receives
    /// bare `ItemDescriptor`s over MPI and has no cursor of its own to walk.
    pub fn from_descriptor(client: Client, descriptor: ItemDescriptor) -> Self {
        Self::new(client, descriptor)
    }

    pub fn dataset_uuid(&self) -> Uuid {
        self.descriptor.dataset
    }

    pub fn run_number(&self) -> RunNumber {
        self.descriptor.run
    }

    pub fn subrun_number(&self) -> SubRunNumber {
        self.descriptor.subrun
    }

    pub fn number(&self) -> EventNumber {
        self.descriptor.event
    }

    pub fn descriptor(&self) -> ItemDescriptor {
        self.descriptor
    }

    pub async fn store_product(&self, product: &ProductKey, value: &[u8]) -> Result<(), Error> {
        Ok(self.client.products().store(&self.descriptor, product, value).await?)
    }

    pub async fn load_product(&self, product: &ProductKey) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.client.products().load(&self.descriptor, product).await?)
    }

    pub async fn exists_product(&self, product: &ProductKey) -> Result<bool, Error> {
        Ok(self.client.products().exists(&self.descriptor, product).await?)
    }

    pub async fn list_products(&self) -> Result<Vec<ProductKey>, Error> {
        Ok(self.client.products().list(&self.descriptor).await?)
    }

    /// POD fast path (§4.1 C5): stores `value` by transmuting it directly to
    /// bytes, skipping any serialization step.
    pub async fn store_pod<T: bytemuck::NoUninit>(
        &self,
        product: &ProductKey,
        value: &T,
    ) -> Result<(), Error> {
        Ok(self.client.products().store_pod(&self.descriptor, product, value).await?)
    }

    pub async fn load_pod<T: bytemuck::AnyBitPattern>(
        &self,
        product: &ProductKey,
    ) -> Result<Option<T>, Error> {
        Ok(self.client.products().load_pod(&self.descriptor, product).await?)
    }
}
