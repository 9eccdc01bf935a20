//! The two-tag MPI wire protocol (§4.5 "Wire protocol"). Every method here
//! blocks the calling OS thread -- rsmpi's point-to-point and collective
//! calls are synchronous -- so callers run them through
//! `tokio::task::spawn_blocking` rather than awaiting them directly (§5
//! lists MPI recv among the scheduler's suspension points).

use hep_key_codec::{ItemDescriptor, ITEM_DESCRIPTOR_LEN};
use mpi::collective::SystemOperation;
use mpi::topology::{Communicator, SimpleCommunicator};
use mpi::traits::*;
use mpi::Rank;

const TAG_REQUEST: i32 = 1;
const TAG_EVENT: i32 = 2;

/// A handle onto the process's `MPI_COMM_WORLD`, scoped to the two tags
/// this protocol uses. Cheap to clone: `SimpleCommunicator` is a thin handle
/// over the underlying communicator, not an owner of MPI state.
#[derive(Clone)]
pub struct Transport {
    world: SimpleCommunicator,
}

impl Transport {
    pub fn new(world: SimpleCommunicator) -> Self {
        Self { world }
    }

    pub fn rank(&self) -> Rank {
        self.world.rank()
    }

    pub fn size(&self) -> Rank {
        self.world.size()
    }

    /// Sends a zero-byte "send me one" request to `loader`.
    pub fn send_request(&self, loader: Rank) {
        self.world.process_at_rank(loader).send_with_tag(&[0u8; 0][..], TAG_REQUEST);
    }

    /// Blocks for the next Tag R request from any source, returning the
    /// sender's rank.
    pub fn recv_request(&self) -> Rank {
        let (_payload, status): (Vec<u8>, _) = self.world.any_process().receive_vec_with_tag(TAG_REQUEST);
        status.source_rank()
    }

    /// Sends an event descriptor, or (if `None`) the zero-byte "no more
    /// work" sentinel, to `consumer`.
    pub fn send_event(&self, consumer: Rank, item: Option<ItemDescriptor>) {
        match item {
            Some(item) => {
                let bytes = item.to_full_bytes();
                self.world.process_at_rank(consumer).send_with_tag(&bytes[..], TAG_EVENT);
            }
            None => {
                self.world.process_at_rank(consumer).send_with_tag(&[0u8; 0][..], TAG_EVENT);
            }
        }
    }

    /// Blocks for a Tag E reply from `loader`; `None` signals "no more
    /// work" and that `loader` should be dropped from the rotation.
    pub fn recv_event(&self, loader: Rank) -> Option<ItemDescriptor> {
        let (payload, _status): (Vec<u8>, _) =
            self.world.process_at_rank(loader).receive_vec_with_tag(TAG_EVENT);
        if payload.is_empty() {
            None
        } else {
            let bytes: [u8; ITEM_DESCRIPTOR_LEN] =
                payload.try_into().expect("Tag E payload is always empty or exactly one descriptor");
            Some(ItemDescriptor::from_full_bytes(&bytes))
        }
    }

    /// `MPI_Allreduce(BAND)` over the dataset UUID's bytes, split into two
    /// u64 halves since `SystemOperation::band` needs an `Equivalence`
    /// type, not a raw byte slice.
    pub fn verify_same_dataset(&self, dataset: u128) -> u128 {
        let local = [(dataset >> 64) as u64, dataset as u64];
        let mut reduced = [0u64; 2];
        self.world.all_reduce_into(&local[..], &mut reduced[..], &SystemOperation::band());
        ((reduced[0] as u128) << 64) | reduced[1] as u128
    }

    pub fn barrier(&self) {
        self.world.barrier();
    }
}
