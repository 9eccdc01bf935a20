//! Accumulates writes and flushes them to their shards in bulk (§4.4 C6).
//!
//! Two flavors share the same per-shard flush logic:
//! - [`WriteBatch`]: entries accumulate in memory; `flush()` groups them by
//!   shard and spawns one task per shard on an [`AsyncEngine`], joining all
//!   of them before returning.
//! - [`AsyncWriteBatch`]: a single background task continuously drains a
//!   channel of incoming writes; `flush()` only signals "everything
//!   submitted so far" and awaits that drain, so writers never block on the
//!   shard round-trip itself.
//!
//! Item-key writes (Run/SubRun/Event/DataSet creation) are idempotent by
//! design (§3.3): a key submitted twice within one flush is silently
//! collapsed to one write. Product writes are not -- submitting the same
//! product key twice in one flush is treated as a caller error, since
//! `put_multi` is an unconditional upsert and a silent second write would
//! otherwise discard the first one with no record of the collision.

mod drain;
mod sync_batch;
mod worker;

pub use drain::{Error, Kind};
pub use sync_batch::WriteBatch;
pub use worker::AsyncWriteBatch;
