//! The `KvShard` contract: a single remote key-value partition. Out of
//! scope for this crate to implement (§1) -- any mature shard-KV provider
//! that satisfies this trait interoperates. `hep-kv-memory` provides an
//! in-process implementation used by this workspace's own tests.

use async_trait::async_trait;

/// Errors a `KvShard` implementation may raise. The `Transient` variant is
/// the only one `StoreCore` retries automatically (§4.1); everything else
/// surfaces to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("transient transport fault: {0}")]
    Transient(String),
    #[error("transport fault: {0}")]
    Transport(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("malformed value: {0}")]
    Serialization(String),
}

/// A remote key-value partition. All methods are blocking from the calling
/// task's perspective; they may suspend at the transport boundary (§5).
#[async_trait]
pub trait KvShard: Send + Sync {
    /// Unconditional upsert.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), ShardError>;

    /// Create-if-absent. Returns `true` if the key was created, `false` if
    /// it already existed (in which case the stored value is unchanged).
    async fn put_if_absent(&self, key: &[u8], value: &[u8]) -> Result<bool, ShardError>;

    /// `put` for many keys at once, applied in the given order. Used by
    /// `WriteBatch` flushes; implementations should preserve submission
    /// order for keys within the same call (§4.4).
    async fn put_multi(&self, items: &[(Vec<u8>, Vec<u8>)]) -> Result<(), ShardError>;

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, ShardError>;

    async fn length(&self, key: &[u8]) -> Result<Option<usize>, ShardError>;

    async fn exists(&self, key: &[u8]) -> Result<bool, ShardError>;

    /// Up to `max` keys strictly greater than `start_exclusive` (or from the
    /// very beginning, if `None`) that share `prefix`, in ascending order.
    async fn list_range(
        &self,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<Vec<u8>>, ShardError>;

    /// As `list_range`, but also returning each key's value.
    async fn list_range_kv(
        &self,
        start_exclusive: Option<&[u8]>,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, ShardError>;
}
