//! Role assignment (§4.5 "Role assignment"): who loads which event shards,
//! and the order each rank queries loaders in. Pure functions of `(T, P,
//! rank)` so they're testable without an MPI runtime.

/// This rank's role given `T` event-category shards and a communicator of
/// size `world_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Owns `owned_shards`, feeding them through the prefetcher into a
    /// local FIFO that both this rank's own consumer loop and remote
    /// consumers pull from.
    Loader { owned_shards: Vec<usize> },
    /// Pulls exclusively from remote loaders.
    Consumer,
}

/// If `T >= P`, every rank loads; rank `r` owns shards `{r, r+P, r+2P, ...}`.
/// If `T < P`, only ranks `0..T` load, one shard each; the rest are pure
/// consumers.
pub fn assign_role(total_event_shards: usize, world_size: i32, rank: i32) -> Role {
    let rank = rank as usize;
    let world_size = world_size.max(1) as usize;

    if total_event_shards >= world_size {
        let owned = (rank..total_event_shards).step_by(world_size).collect();
        Role::Loader { owned_shards: owned }
    } else if rank < total_event_shards {
        Role::Loader { owned_shards: vec![rank] }
    } else {
        Role::Consumer
    }
}

/// The ranks that hold `Role::Loader` under [`assign_role`], in ascending
/// order. Every rank computes this identically from the same `(T, P)`
/// inputs, so no coordination round-trip is needed to learn who the
/// loaders are.
pub fn loader_ranks(total_event_shards: usize, world_size: i32) -> Vec<i32> {
    let world_size = world_size.max(1) as usize;
    let loaders = total_event_shards.max(1).min(world_size);
    (0..loaders as i32).collect()
}

/// The order a consumer on `rank` queries `loader_ranks` in: the list
/// rotated so it starts near this rank, so consumers don't all converge on
/// loader 0 first (§4.5 "Consumer loop").
pub fn rotation_for(rank: i32, loader_ranks: &[i32]) -> Vec<i32> {
    if loader_ranks.is_empty() {
        return Vec::new();
    }
    let start = loader_ranks
        .iter()
        .position(|&r| r == rank)
        .unwrap_or_else(|| rank.rem_euclid(loader_ranks.len() as i32) as usize);

    let mut out = Vec::with_capacity(loader_ranks.len());
    out.extend_from_slice(&loader_ranks[start..]);
    out.extend_from_slice(&loader_ranks[..start]);
    out
}
