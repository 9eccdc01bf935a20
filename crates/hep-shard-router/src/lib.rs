//! Consistent-hash routing from logical keys to shard indices (§4.1).

mod category;
mod jump_hash;
mod router;

pub use category::Category;
pub use jump_hash::{fnv1a, jump_hash};
pub use router::{Error, ShardRouter};
