//! The 40-byte `ItemDescriptor` binary layout (§3.2) and the four logical
//! levels (DataSet, Run, SubRun, Event) it can represent.

use crate::error::Error;
use std::cmp::Ordering;

pub type RunNumber = u64;
pub type SubRunNumber = u64;
pub type EventNumber = u64;

/// Re-exported so downstream crates don't need a direct `uuid` dependency
/// just to name the dataset identifier type.
pub use uuid::Uuid as DatasetId;

pub const RUN_SENTINEL: RunNumber = RunNumber::MAX;
pub const SUBRUN_SENTINEL: SubRunNumber = SubRunNumber::MAX;
pub const EVENT_SENTINEL: EventNumber = EventNumber::MAX;

pub const DATASET_DESCRIPTOR_LEN: usize = 16;
pub const RUN_DESCRIPTOR_LEN: usize = 24;
pub const SUBRUN_DESCRIPTOR_LEN: usize = 32;
pub const ITEM_DESCRIPTOR_LEN: usize = 40;

/// The nesting level a descriptor denotes. Declaration order is significant:
/// `derive(PartialOrd, Ord)` gives exactly the `dataset < run < subrun <
/// event` precedence that §3.2 requires for cross-level comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Dataset,
    Run,
    SubRun,
    Event,
}

impl Level {
    /// Byte width of this level's own on-wire key encoding.
    pub fn encoded_len(self) -> usize {
        match self {
            Level::Dataset => DATASET_DESCRIPTOR_LEN,
            Level::Run => RUN_DESCRIPTOR_LEN,
            Level::SubRun => SUBRUN_DESCRIPTOR_LEN,
            Level::Event => ITEM_DESCRIPTOR_LEN,
        }
    }

    /// The level of items nested directly beneath this one, if any.
    pub fn child(self) -> Option<Level> {
        match self {
            Level::Dataset => Some(Level::Run),
            Level::Run => Some(Level::SubRun),
            Level::SubRun => Some(Level::Event),
            Level::Event => None,
        }
    }
}

/// The 40-byte binary identifier of any item in the DataSet/Run/SubRun/Event
/// hierarchy. Fields beyond an item's own level hold their sentinel (`MAX`)
/// value: a Run-level value has `subrun == SUBRUN_SENTINEL` and `event ==
/// EVENT_SENTINEL`. Descriptors are value types, freely copyable, and carry
/// no lifetime of their own (§9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemDescriptor {
    pub dataset: DatasetId,
    pub run: RunNumber,
    pub subrun: SubRunNumber,
    pub event: EventNumber,
}

impl ItemDescriptor {
    pub fn dataset(dataset: DatasetId) -> Self {
        Self {
            dataset,
            run: RUN_SENTINEL,
            subrun: SUBRUN_SENTINEL,
            event: EVENT_SENTINEL,
        }
    }

    pub fn run(dataset: DatasetId, run: RunNumber) -> Self {
        Self {
            dataset,
            run,
            subrun: SUBRUN_SENTINEL,
            event: EVENT_SENTINEL,
        }
    }

    pub fn subrun(dataset: DatasetId, run: RunNumber, subrun: SubRunNumber) -> Self {
        Self {
            dataset,
            run,
            subrun,
            event: EVENT_SENTINEL,
        }
    }

    pub fn event(
        dataset: DatasetId,
        run: RunNumber,
        subrun: SubRunNumber,
        event: EventNumber,
    ) -> Self {
        Self {
            dataset,
            run,
            subrun,
            event,
        }
    }

    /// Recovers the level this descriptor denotes by inspecting which
    /// trailing fields are held at their sentinel value.
    pub fn level(&self) -> Level {
        if self.run == RUN_SENTINEL {
            Level::Dataset
        } else if self.subrun == SUBRUN_SENTINEL {
            Level::Run
        } else if self.event == EVENT_SENTINEL {
            Level::SubRun
        } else {
            Level::Event
        }
    }

    /// Encodes this descriptor at an explicit level's natural width. Callers
    /// that already know which shard category they're addressing (the usual
    /// case: a cursor iterating a specific level) should call this rather
    /// than [`Self::encode_self`], since a descriptor's own sentinel fields
    /// are ambiguous once used as an arithmetic bound (see `predecessor`).
    pub fn encode(&self, level: Level) -> Vec<u8> {
        let mut buf = Vec::with_capacity(level.encoded_len());
        buf.extend_from_slice(self.dataset.as_bytes());
        if level >= Level::Run {
            buf.extend_from_slice(&self.run.to_be_bytes());
        }
        if level >= Level::SubRun {
            buf.extend_from_slice(&self.subrun.to_be_bytes());
        }
        if level >= Level::Event {
            buf.extend_from_slice(&self.event.to_be_bytes());
        }
        buf
    }

    /// Encodes at this descriptor's own level, as recovered by [`Self::level`].
    pub fn encode_self(&self) -> Vec<u8> {
        self.encode(self.level())
    }

    /// Always the full 40-byte form, sentinel-padded. This is the prefix
    /// used by product keys (§3.2), which must address an item uniquely
    /// regardless of its level.
    pub fn to_full_bytes(&self) -> [u8; ITEM_DESCRIPTOR_LEN] {
        let mut buf = [0u8; ITEM_DESCRIPTOR_LEN];
        buf[0..16].copy_from_slice(self.dataset.as_bytes());
        buf[16..24].copy_from_slice(&self.run.to_be_bytes());
        buf[24..32].copy_from_slice(&self.subrun.to_be_bytes());
        buf[32..40].copy_from_slice(&self.event.to_be_bytes());
        buf
    }

    pub fn from_full_bytes(bytes: &[u8; ITEM_DESCRIPTOR_LEN]) -> Self {
        Self::decode(Level::Event, bytes).expect("fixed-size array decodes infallibly")
    }

    /// Decodes a key of exactly `level.encoded_len()` bytes, filling any
    /// trailing fields not present in the encoding with their sentinel.
    pub fn decode(level: Level, bytes: &[u8]) -> Result<Self, Error> {
        let expected = level.encoded_len();
        if bytes.len() != expected {
            return Err(Error::WrongLength {
                expected,
                actual: bytes.len(),
            });
        }
        let dataset = DatasetId::from_slice(&bytes[0..16]).map_err(|_| Error::WrongLength {
            expected: 16,
            actual: bytes.len().min(16),
        })?;
        let run = if level >= Level::Run {
            u64::from_be_bytes(bytes[16..24].try_into().unwrap())
        } else {
            RUN_SENTINEL
        };
        let subrun = if level >= Level::SubRun {
            u64::from_be_bytes(bytes[24..32].try_into().unwrap())
        } else {
            SUBRUN_SENTINEL
        };
        let event = if level >= Level::Event {
            u64::from_be_bytes(bytes[32..40].try_into().unwrap())
        } else {
            EVENT_SENTINEL
        };
        Ok(Self {
            dataset,
            run,
            subrun,
            event,
        })
    }

    /// The smallest possible child of `self` one level down (child's own
    /// numeric field held at zero), or `None` if `self` is already an
    /// Event (the leaf level). Used to seed cursor iteration over `self`'s
    /// children.
    pub fn first_child(&self) -> Option<Self> {
        match self.level() {
            Level::Dataset => Some(Self::run(self.dataset, 0)),
            Level::Run => Some(Self::subrun(self.dataset, self.run, 0)),
            Level::SubRun => Some(Self::event(self.dataset, self.run, self.subrun, 0)),
            Level::Event => None,
        }
    }

    /// The byte prefix shared by every child of `self`: `self` encoded at
    /// its own level. A child's encoding extends this prefix with exactly
    /// one more big-endian field.
    pub fn child_prefix(&self) -> Vec<u8> {
        self.encode(self.level())
    }

    /// The descriptor immediately before `self` within `level`'s key space,
    /// decrementing the last field defined at that level with borrow into
    /// more significant fields. Returns `None` if `self` is already the
    /// first possible key at `level` for its dataset (used by `lower_bound`
    /// to detect "no predecessor, scan from the very start").
    pub fn predecessor(&self, level: Level) -> Option<Self> {
        let mut run = self.run;
        let mut subrun = self.subrun;
        let mut event = self.event;

        match level {
            Level::Dataset => return None,
            Level::Run => {
                if run == 0 {
                    return None;
                }
                run -= 1;
            }
            Level::SubRun => {
                if subrun == 0 {
                    if run == 0 {
                        return None;
                    }
                    run -= 1;
                    subrun = u64::MAX;
                } else {
                    subrun -= 1;
                }
            }
            Level::Event => {
                if event == 0 {
                    if subrun == 0 {
                        if run == 0 {
                            return None;
                        }
                        run -= 1;
                        subrun = u64::MAX;
                    } else {
                        subrun -= 1;
                    }
                    event = u64::MAX;
                } else {
                    event -= 1;
                }
            }
        }

        Some(Self {
            dataset: self.dataset,
            run,
            subrun,
            event,
        })
    }
}

/// Total order per §3.2: level first, then dataset bytes, then run, subrun,
/// event. Byte-wise comparison of `encode(level)` agrees with this order for
/// any two descriptors sharing a level (the only comparison that occurs on
/// the wire, since each level lives in its own shard category).
impl PartialOrd for ItemDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ItemDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level()
            .cmp(&other.level())
            .then_with(|| self.dataset.as_bytes().cmp(other.dataset.as_bytes()))
            .then_with(|| self.run.cmp(&other.run))
            .then_with(|| self.subrun.cmp(&other.subrun))
            .then_with(|| self.event.cmp(&other.event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(b: u8) -> DatasetId {
        DatasetId::from_bytes([b; 16])
    }

    #[test]
    fn round_trip_all_levels() {
        let d = ItemDescriptor::dataset(uuid(1));
        assert_eq!(ItemDescriptor::decode(Level::Dataset, &d.encode(Level::Dataset)).unwrap(), d);

        let r = ItemDescriptor::run(uuid(1), 36);
        assert_eq!(ItemDescriptor::decode(Level::Run, &r.encode(Level::Run)).unwrap(), r);

        let s = ItemDescriptor::subrun(uuid(1), 36, 42);
        assert_eq!(
            ItemDescriptor::decode(Level::SubRun, &s.encode(Level::SubRun)).unwrap(),
            s
        );

        let e = ItemDescriptor::event(uuid(1), 36, 42, 13);
        assert_eq!(ItemDescriptor::decode(Level::Event, &e.encode(Level::Event)).unwrap(), e);
        assert_eq!(ItemDescriptor::from_full_bytes(&e.to_full_bytes()), e);
    }

    #[test]
    fn encoding_order_matches_semantic_order_within_a_level() {
        let u = uuid(1);
        let mut runs: Vec<_> = [46u64, 42, 44, 43, 45].iter().map(|&n| ItemDescriptor::run(u, n)).collect();
        let mut by_bytes = runs.clone();
        runs.sort();
        by_bytes.sort_by(|a, b| a.encode(Level::Run).cmp(&b.encode(Level::Run)));
        assert_eq!(runs, by_bytes);
        assert_eq!(runs.iter().map(|d| d.run).collect::<Vec<_>>(), vec![42, 43, 44, 45, 46]);
    }

    #[test]
    fn level_takes_precedence_over_field_magnitude() {
        let u = uuid(1);
        let run_level = ItemDescriptor::run(u, 5); // subrun/event held at sentinel
        let subrun_level = ItemDescriptor::subrun(u, 5, 3);
        assert!(run_level < subrun_level, "a Run must sort before any SubRun under it");
    }

    #[test]
    fn predecessor_borrows_across_fields() {
        let u = uuid(1);
        let e = ItemDescriptor::event(u, 1, 0, 0);
        let p = e.predecessor(Level::Event).unwrap();
        assert_eq!(p.run, 0);
        assert_eq!(p.subrun, u64::MAX);
        assert_eq!(p.event, u64::MAX);

        let origin = ItemDescriptor::event(u, 0, 0, 0);
        assert!(origin.predecessor(Level::Event).is_none());
    }
}
