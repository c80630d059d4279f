//! Platform inventory snapshot
//!
//! Built from the NDJSON output of the product snapshot bulk query. The file
//! holds three kinds of lines:
//!
//! ```text
//! {"id":"gid://shopify/Product/1"}
//! {"id":"gid://shopify/MediaImage/7","__parentId":"gid://shopify/Product/1"}
//! {"sku":"A1","inventoryQuantity":5,"inventoryItem":{"id":"gid://shopify/InventoryItem/3"},"__parentId":"gid://shopify/Product/1"}
//! ```

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// What the platform currently holds for one SKU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInventoryEntry {
    pub sku: String,
    pub quantity: i64,
    pub product_id: Option<String>,
    pub inventory_item_id: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
}

/// SKU to entry map
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: HashMap<String, PlatformInventoryEntry>,
}

impl Snapshot {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = PlatformInventoryEntry>,
    {
        let mut snapshot = Snapshot::default();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Add or replace the entry for `entry.sku`
    pub fn insert(&mut self, entry: PlatformInventoryEntry) {
        if let Some(previous) = self.entries.insert(entry.sku.clone(), entry) {
            debug!(sku = %previous.sku, "Replaced snapshot entry for SKU");
        }
    }

    pub fn get(&self, sku: &str) -> Option<&PlatformInventoryEntry> {
        self.entries.get(sku)
    }

    pub fn contains(&self, sku: &str) -> bool {
        self.entries.contains_key(sku)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    inventory_quantity: Option<i64>,
    #[serde(default)]
    inventory_item: Option<IdRef>,
    #[serde(default, rename = "__parentId")]
    parent_id: Option<String>,
}

/// Build the snapshot from the bulk query result at `path`.
///
/// Variants without a SKU or quantity are ignored. If a SKU appears on more
/// than one variant the last line wins.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();
    let mut media: HashMap<String, Vec<String>> = HashMap::new();
    let mut ignored = 0usize;

    rsr_common::jsonl::for_each_line(path, |line: SnapshotLine| {
        match line {
            SnapshotLine {
                inventory_item: Some(item),
                sku,
                inventory_quantity,
                parent_id,
                ..
            } => match (sku.filter(|s| !s.trim().is_empty()), inventory_quantity) {
                (Some(sku), Some(quantity)) => snapshot.insert(PlatformInventoryEntry {
                    sku,
                    quantity,
                    product_id: parent_id,
                    inventory_item_id: item.id,
                    media_ids: Vec::new(),
                }),
                _ => ignored += 1,
            },
            SnapshotLine {
                id: Some(id),
                parent_id: Some(parent),
                ..
            } => media.entry(parent).or_default().push(id),
            _ => {},
        }
        Ok(())
    })
    .map_err(|e| SyncError::Snapshot(format!("{}: {e}", path.display())))?;

    for entry in snapshot.entries.values_mut() {
        if let Some(ids) = entry.product_id.as_ref().and_then(|p| media.get(p)) {
            entry.media_ids = ids.clone();
        }
    }

    info!(
        path = %path.display(),
        skus = snapshot.len(),
        ignored_variants = ignored,
        "Loaded platform snapshot"
    );
    Ok(snapshot)
}
