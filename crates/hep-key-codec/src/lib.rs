//! Binary key layouts for the HEP object store (§3.2, §6.1).
//!
//! Three key families share the wire: [`descriptor::ItemDescriptor`] for
//! Run/SubRun/Event items, [`product_key`] for products attached to any
//! item or dataset, and [`dataset_key`] for the DataSet path namespace.
//! All integer fields are big-endian so byte-wise lexicographic key order
//! matches semantic order, which downstream shards rely on for `list_range`.

pub mod dataset_key;
pub mod descriptor;
mod error;
pub mod product_key;

pub use error::Error;

pub use descriptor::{
    DatasetId, EventNumber, ItemDescriptor, Level, RunNumber, SubRunNumber, DATASET_DESCRIPTOR_LEN,
    EVENT_SENTINEL, ITEM_DESCRIPTOR_LEN, RUN_DESCRIPTOR_LEN, RUN_SENTINEL, SUBRUN_DESCRIPTOR_LEN,
    SUBRUN_SENTINEL,
};
pub use product_key::{decode_product_key, encode_product_key, ProductKey};
