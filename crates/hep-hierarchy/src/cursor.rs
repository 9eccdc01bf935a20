//! The forward-cursor algorithm of §4.2: `lower_bound`, `upper_bound`,
//! `find`, and step-wise iteration, all expressed as a single cursor type
//! with no inheritance (§9 design note -- the source's `iterator`/
//! `const_iterator` split collapses to one type here).

use std::sync::Arc;

use hep_key_codec::{ItemDescriptor, Level};
use hep_store_core::{Category, StoreCore};

use crate::error::Error;

pub(crate) fn category_for(level: Level) -> Category {
    match level {
        Level::Dataset => Category::Dataset,
        Level::Run => Category::Run,
        Level::SubRun => Category::SubRun,
        Level::Event => Category::Event,
    }
}

/// `exists(x)`: O(1) round-trips, per §4.2.
pub(crate) async fn exists(store: &StoreCore, level: Level, x: ItemDescriptor) -> Result<bool, Error> {
    let key = x.encode(level);
    Ok(store.exists(category_for(level), x.dataset.as_bytes(), &key).await?)
}

/// `lower_bound(x)`: the smallest existing item `>= x`, within the key
/// space sharing `x`'s parent prefix.
pub(crate) async fn lower_bound(
    store: &StoreCore,
    level: Level,
    prefix: &[u8],
    x: ItemDescriptor,
) -> Result<Option<ItemDescriptor>, Error> {
    let category = category_for(level);
    let routing_key = x.dataset.as_bytes();
    let key = x.encode(level);

    if store.exists(category, routing_key, &key).await? {
        return Ok(Some(x));
    }

    let start = x.predecessor(level).map(|p| p.encode(level));
    let hits = store
        .list_range(category, routing_key, start.as_deref(), prefix, 1)
        .await?;
    decode_first(level, hits)
}

/// `upper_bound(x)`: the smallest existing item strictly `> x`. This is
/// also exactly the per-step advance used by forward iteration (§4.2 steps
/// 1-4: encode `current` as an exclusive lower bound, `list_range` by one).
pub(crate) async fn upper_bound(
    store: &StoreCore,
    level: Level,
    prefix: &[u8],
    x: ItemDescriptor,
) -> Result<Option<ItemDescriptor>, Error> {
    let category = category_for(level);
    let routing_key = x.dataset.as_bytes();
    let key = x.encode(level);

    let hits = store.list_range(category, routing_key, Some(&key), prefix, 1).await?;
    decode_first(level, hits)
}

fn decode_first(level: Level, mut hits: Vec<Vec<u8>>) -> Result<Option<ItemDescriptor>, Error> {
    match hits.pop() {
        Some(bytes) => Ok(Some(ItemDescriptor::decode(level, &bytes)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    /// Not yet positioned; the next `next()` call seeks the first item.
    Before,
    At(ItemDescriptor),
    End,
}

/// A forward cursor over the children of one parent item, at a single
/// level, on a single shard (routed by the containing dataset). Either
/// valid (pointing at an existing item) or terminal -- there is no
/// "rewind"; `Cursor` is consumed by iterating forward only (§4.2).
#[derive(Clone)]
pub struct Cursor {
    store: Arc<StoreCore>,
    level: Level,
    prefix: Vec<u8>,
    state: State,
}

impl Cursor {
    /// A cursor over `parent`'s children, starting before the first.
    pub fn over_children(store: Arc<StoreCore>, parent: ItemDescriptor) -> Option<Self> {
        let level = parent.level().child()?;
        Some(Self {
            store,
            level,
            prefix: parent.child_prefix(),
            state: State::Before,
        })
    }

    /// A cursor over `parent`'s children, already positioned at `at` (the
    /// next `next()` call returns the item after it). Used to resume
    /// iteration from a point a prefetcher has already read ahead to.
    pub fn positioned_at(
        store: Arc<StoreCore>,
        parent: ItemDescriptor,
        at: ItemDescriptor,
    ) -> Option<Self> {
        let level = parent.level().child()?;
        Some(Self {
            store,
            level,
            prefix: parent.child_prefix(),
            state: State::At(at),
        })
    }

    /// The current item, if the cursor is valid.
    pub fn current(&self) -> Option<ItemDescriptor> {
        match self.state {
            State::At(d) => Some(d),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, State::End)
    }

    /// Advances to and returns the next item, or `None` once exhausted.
    /// Calling `next()` again after `None` keeps returning `None`.
    pub async fn next(&mut self) -> Result<Option<ItemDescriptor>, Error> {
        let result = match self.state {
            State::End => None,
            State::Before => {
                // Begin from the smallest possible child; there's always
                // one candidate value even if no item exists there yet.
                let min = min_child(self.level, &self.prefix)?;
                lower_bound(&self.store, self.level, &self.prefix, min).await?
            }
            State::At(cur) => upper_bound(&self.store, self.level, &self.prefix, cur).await?,
        };
        self.state = match result {
            Some(d) => State::At(d),
            None => State::End,
        };
        Ok(result)
    }

    /// Advances up to `max` steps, returning however many items were found
    /// before the cursor went terminal. Used by the synchronous prefetcher
    /// to refill its lookahead window in batches (§4.3.1); each step is
    /// still its own round trip, since a forward cursor only ever learns
    /// its next exclusive bound after seeing the current item.
    pub async fn next_batch(&mut self, max: usize) -> Result<Vec<ItemDescriptor>, Error> {
        let mut out = Vec::with_capacity(max);
        for _ in 0..max {
            match self.next().await? {
                Some(d) => out.push(d),
                None => break,
            }
        }
        Ok(out)
    }
}

/// Reconstructs the minimal child descriptor (numeric field zero) from a
/// parent's already-encoded `child_prefix`, without requiring the caller to
/// also pass the parent descriptor itself.
fn min_child(level: Level, prefix: &[u8]) -> Result<ItemDescriptor, Error> {
    let parent_level = match level {
        Level::Run => Level::Dataset,
        Level::SubRun => Level::Run,
        Level::Event => Level::SubRun,
        Level::Dataset => {
            return Err(Error::InvalidArgument("dataset level has no parent".into()))
        }
    };
    let parent = ItemDescriptor::decode(parent_level, prefix)?;
    parent
        .first_child()
        .ok_or_else(|| Error::InvalidArgument("level has no children".into()))
}
