//! Reconciliation between the distributor feed and the platform
//!
//! The [`Reconciler`] classifies feed records against the platform snapshot and
//! turns the result into bulk payload lines. It holds no network state.

pub mod classify;
pub mod payload;
pub mod results;
pub mod snapshot;

pub use classify::{classify, DeltaEntry, DeltaKind, SyncDelta};
pub use payload::{batches, build_create_line, build_quantity_update_line};
pub use results::{apply_creation_results, CreationFailure, CreationSummary};
pub use snapshot::{load_snapshot, PlatformInventoryEntry, Snapshot};

use crate::catalog::CategoryResolver;
use crate::config::ReconcileConfig;
use crate::feed::Feed;
use crate::shopify::types::QuantityUpdateLine;
use serde_json::Value;
use tracing::warn;

/// Builds sync decisions and payloads for one run
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconcileConfig,
    resolver: CategoryResolver,
    location_id: String,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig, resolver: CategoryResolver, location_id: impl Into<String>) -> Self {
        Self {
            config,
            resolver,
            location_id: location_id.into(),
        }
    }

    pub fn classify(&self, feed: &Feed, snapshot: &Snapshot) -> SyncDelta {
        classify(feed, snapshot, &self.resolver)
    }

    /// `productSet` lines for every new record in `delta`
    pub fn create_lines(&self, feed: &Feed, delta: &SyncDelta) -> Vec<Value> {
        delta
            .new_records()
            .filter_map(|entry| feed.get(&entry.sku))
            .map(|record| {
                let category = self.resolver.resolve(record.department());
                build_create_line(record, &category, &self.config)
            })
            .collect()
    }

    /// Absolute quantity lines for every changed record in `delta`
    pub fn quantity_lines(&self, feed: &Feed, snapshot: &Snapshot, delta: &SyncDelta) -> Vec<QuantityUpdateLine> {
        delta
            .changed()
            .filter_map(|entry| match (snapshot.get(&entry.sku), feed.get(&entry.sku)) {
                (Some(platform), Some(record)) => {
                    Some(build_quantity_update_line(platform, record, &self.location_id))
                },
                _ => {
                    warn!(sku = %entry.sku, "Changed SKU missing from feed or snapshot");
                    None
                },
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::category::{CategoryEntry, CategoryMap};
    use crate::feed::parser::{FeedRecord, DEPARTMENT, QUANTITY, SKU};

    fn record(sku: &str, quantity: i64) -> FeedRecord {
        let mut cols = vec![String::new(); 78];
        cols[SKU] = sku.into();
        cols[QUANTITY] = quantity.to_string();
        cols[DEPARTMENT] = "05".into();
        FeedRecord::from_values(cols)
    }

    fn reconciler() -> Reconciler {
        let map = CategoryMap {
            entries: vec![CategoryEntry {
                title: "Long Guns".into(),
                handle: "long-guns".into(),
                gid: "gid://shopify/Collection/5".into(),
            }],
        };
        Reconciler::new(
            ReconcileConfig {
                category_map_path: "collections.json".into(),
                category_strict: false,
                uncategorized_gid: None,
                image_url_template: crate::config::DEFAULT_IMAGE_URL_TEMPLATE.into(),
            },
            CategoryResolver::new(&map),
            "gid://shopify/Location/1",
        )
    }

    #[test]
    fn test_changed_record_produces_target_quantity() {
        let feed = Feed::from_records([record("A1", 2)]);
        let snapshot = Snapshot::from_entries([PlatformInventoryEntry {
            sku: "A1".into(),
            quantity: 5,
            product_id: None,
            inventory_item_id: "gid://shopify/InventoryItem/1".into(),
            media_ids: Vec::new(),
        }]);
        let reconciler = reconciler();

        let delta = reconciler.classify(&feed, &snapshot);
        let lines = reconciler.quantity_lines(&feed, &snapshot, &delta);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].inventory_item_id, "gid://shopify/InventoryItem/1");
        assert!(reconciler.create_lines(&feed, &delta).is_empty());
    }

    #[test]
    fn test_new_record_produces_create_line() {
        let feed = Feed::from_records([record("B1", 4)]);
        let reconciler = reconciler();

        let delta = reconciler.classify(&feed, &Snapshot::default());
        let lines = reconciler.create_lines(&feed, &delta);

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["input"]["variants"][0]["sku"], "B1");
        assert_eq!(lines[0]["input"]["collections"][0], "gid://shopify/Collection/5");
    }
}
