//! Feed versus snapshot classification

use crate::catalog::{CategoryRef, CategoryResolver};
use crate::error::Result;
use crate::feed::Feed;
use crate::reconcile::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    /// No platform entry for the SKU
    New,
    /// Platform quantity differs from the feed
    Changed,
    Unchanged,
}

/// Classification of one feed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEntry {
    pub sku: String,
    pub kind: DeltaKind,
    pub feed_quantity: i64,
    pub platform_quantity: Option<i64>,
    /// `platform - feed` for changed records
    pub delta: Option<i64>,
    /// Resolved collection, for new records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryRef>,
}

/// Classification of a whole feed, in feed order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDelta {
    pub entries: Vec<DeltaEntry>,
}

impl SyncDelta {
    pub fn of_kind(&self, kind: DeltaKind) -> impl Iterator<Item = &DeltaEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn new_records(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.of_kind(DeltaKind::New)
    }

    pub fn changed(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.of_kind(DeltaKind::Changed)
    }

    pub fn unchanged(&self) -> impl Iterator<Item = &DeltaEntry> {
        self.of_kind(DeltaKind::Unchanged)
    }

    pub fn count(&self, kind: DeltaKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Write the delta as NDJSON
    pub fn write(&self, path: &Path) -> Result<usize> {
        Ok(rsr_common::jsonl::write_lines(path, &self.entries)?)
    }

    /// Read a delta written by [`SyncDelta::write`]
    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self {
            entries: rsr_common::jsonl::read_lines(path)?,
        })
    }
}

/// Classify every feed record against the snapshot.
///
/// A record is new iff the snapshot has no entry for its SKU and changed iff
/// the entry's quantity differs from the feed's.
pub fn classify(feed: &Feed, snapshot: &Snapshot, resolver: &CategoryResolver) -> SyncDelta {
    let entries = feed
        .iter()
        .map(|record| {
            let feed_quantity = record.quantity();
            match snapshot.get(record.sku()) {
                None => DeltaEntry {
                    sku: record.sku().to_string(),
                    kind: DeltaKind::New,
                    feed_quantity,
                    platform_quantity: None,
                    delta: None,
                    category: Some(resolver.resolve(record.department())),
                },
                Some(entry) if entry.quantity != feed_quantity => DeltaEntry {
                    sku: record.sku().to_string(),
                    kind: DeltaKind::Changed,
                    feed_quantity,
                    platform_quantity: Some(entry.quantity),
                    delta: Some(entry.quantity - feed_quantity),
                    category: None,
                },
                Some(entry) => DeltaEntry {
                    sku: record.sku().to_string(),
                    kind: DeltaKind::Unchanged,
                    feed_quantity,
                    platform_quantity: Some(entry.quantity),
                    delta: None,
                    category: None,
                },
            }
        })
        .collect();

    SyncDelta { entries }
}
