//! The `ls` subcommand's tree print (§6.3): a raw scan over every
//! `Dataset`-category shard (datasets aren't enumerable by path alone --
//! nothing names "list every top-level dataset" in the hierarchy API by
//! design, since paths are caller-supplied), followed by each dataset's own
//! `runs()`/`subruns()`/`events()` cursors.

use std::collections::BTreeMap;
use std::sync::Arc;

use hep_hierarchy::Client as HierarchyClient;
use hep_key_codec::dataset_key;
use hep_store_core::{Category, StoreCore};
use uuid::Uuid;

use crate::Error;

const SCAN_BATCH: usize = 256;

struct FoundDataset {
    parent_path: String,
    name: String,
    uuid: Uuid,
}

async fn scan_all_datasets(store: &Arc<StoreCore>) -> Result<Vec<FoundDataset>, Error> {
    let mut found = Vec::new();
    for shard in 0..store.shard_count(Category::Dataset) {
        let mut start: Option<Vec<u8>> = None;
        loop {
            let hits = store
                .list_range_kv_on_shard(Category::Dataset, shard, start.as_deref(), &[], SCAN_BATCH)
                .await?;
            if hits.is_empty() {
                break;
            }
            let short_read = hits.len() < SCAN_BATCH;
            for (key, value) in &hits {
                let (_level, parent_path, name) = dataset_key::decode_dataset_key(key)
                    .map_err(|e| hep_store_core::Error::Logic(e.to_string()))?;
                let uuid = Uuid::from_slice(value)
                    .map_err(|e| hep_store_core::Error::Logic(format!("malformed dataset uuid: {e}")))?;
                found.push(FoundDataset { parent_path, name, uuid });
            }
            start = hits.last().map(|(k, _)| k.clone());
            if short_read {
                break;
            }
        }
    }
    Ok(found)
}

/// Prints every dataset this config's shards know about, each followed by
/// its runs, subruns, and events, indented by level.
pub async fn print_tree(client: &HierarchyClient, store: &Arc<StoreCore>) -> Result<(), Error> {
    let datasets = scan_all_datasets(store).await?;
    let mut by_parent: BTreeMap<String, Vec<&FoundDataset>> = BTreeMap::new();
    for dataset in &datasets {
        by_parent.entry(dataset.parent_path.clone()).or_default().push(dataset);
    }
    print_children(client, &by_parent, "", 0).await
}

fn print_children<'a>(
    client: &'a HierarchyClient,
    by_parent: &'a BTreeMap<String, Vec<&'a FoundDataset>>,
    parent_path: &'a str,
    depth: usize,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), Error>> + 'a>> {
    Box::pin(async move {
        let Some(children) = by_parent.get(parent_path) else {
            return Ok(());
        };
        for dataset in children {
            let indent = "  ".repeat(depth);
            println!("{indent}{} ({})", dataset.name, dataset.uuid);

            let handle = client.dataset_handle(&dataset.parent_path, &dataset.name, dataset.uuid);
            print_runs(&handle, &indent).await?;

            let full_path = dataset_key::join_path(&dataset.parent_path, &dataset.name);
            print_children(client, by_parent, &full_path, depth + 1).await?;
        }
        Ok(())
    })
}

async fn print_runs(dataset: &hep_hierarchy::DataSet, indent: &str) -> Result<(), Error> {
    let mut cursor = dataset.runs();
    loop {
        let batch = cursor.next_batch(SCAN_BATCH).await?;
        let short_read = batch.len() < SCAN_BATCH;
        for descriptor in &batch {
            println!("{indent}  run {}", descriptor.run);
            let Some(run) = dataset.find_run(descriptor.run).await? else {
                continue;
            };
            print_subruns(&run, indent).await?;
        }
        if short_read {
            break;
        }
    }
    Ok(())
}

async fn print_subruns(run: &hep_hierarchy::Run, indent: &str) -> Result<(), Error> {
    let mut cursor = run.subruns();
    loop {
        let batch = cursor.next_batch(SCAN_BATCH).await?;
        let short_read = batch.len() < SCAN_BATCH;
        for descriptor in &batch {
            println!("{indent}    subrun {}", descriptor.subrun);
            let Some(subrun) = run.find_subrun(descriptor.subrun).await? else {
                continue;
            };
            print_events(&subrun, indent).await?;
        }
        if short_read {
            break;
        }
    }
    Ok(())
}

async fn print_events(subrun: &hep_hierarchy::SubRun, indent: &str) -> Result<(), Error> {
    let mut cursor = subrun.events();
    loop {
        let batch = cursor.next_batch(SCAN_BATCH).await?;
        let short_read = batch.len() < SCAN_BATCH;
        for descriptor in &batch {
            println!("{indent}      event {}", descriptor.event);
        }
        if short_read {
            break;
        }
    }
    Ok(())
}
