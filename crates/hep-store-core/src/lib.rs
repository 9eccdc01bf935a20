//! Sharded put/get/list operations (§4.1), built on `hep-shard-router` for
//! placement and an opaque `KvShard` transport contract for the actual
//! remote calls.

mod error;
mod kv_shard;
mod store_core;

pub use error::Error;
pub use kv_shard::{KvShard, ShardError};
pub use store_core::{PutOnceOutcome, StoreCore};

pub use hep_shard_router::Category;
