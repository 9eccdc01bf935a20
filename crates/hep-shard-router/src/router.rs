use std::collections::HashMap;

use crate::category::Category;
use crate::jump_hash::{fnv1a, jump_hash};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no shards configured for category {0:?}")]
    EmptyCategory(Category),
}

/// Maps a `(category, routing_key)` pair to one of that category's shard
/// indices via jump consistent hashing (§4.1). `ShardRouter` carries only
/// shard *counts*, not the shard connections themselves -- it answers "which
/// index", and the caller (typically `StoreCore`) owns the actual `KvShard`
/// handles indexed the same way.
#[derive(Debug, Clone)]
pub struct ShardRouter {
    counts: HashMap<Category, usize>,
}

impl ShardRouter {
    pub fn new(counts: HashMap<Category, usize>) -> Self {
        Self { counts }
    }

    pub fn shard_count(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Routes `routing_key` within `category` to a shard index in
    /// `[0, shard_count(category))`.
    ///
    /// Routing keys per §4.1: the containing dataset's UUID bytes for
    /// items, the parent path + name for datasets, the full product key
    /// for products.
    pub fn route(&self, category: Category, routing_key: &[u8]) -> Result<usize, Error> {
        let count = self.shard_count(category);
        if count == 0 {
            return Err(Error::EmptyCategory(category));
        }
        Ok(jump_hash(fnv1a(routing_key), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(n: usize) -> ShardRouter {
        let mut counts = HashMap::new();
        counts.insert(Category::Event, n);
        ShardRouter::new(counts)
    }

    #[test]
    fn routes_within_bounds() {
        let r = router(7);
        for i in 0..1000u32 {
            let idx = r.route(Category::Event, &i.to_be_bytes()).unwrap();
            assert!(idx < 7);
        }
    }

    #[test]
    fn same_key_always_same_shard() {
        let r = router(5);
        let key = b"dataset-uuid-bytes";
        let a = r.route(Category::Event, key).unwrap();
        let b = r.route(Category::Event, key).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_category_is_an_error() {
        let r = router(0);
        assert!(r.route(Category::Dataset, b"x").is_err());
    }
}
