//! Sync run driver
//!
//! One run, in order:
//!
//! 1. load and validate the category map
//! 2. fetch the feed (fatal on failure) and parse it
//! 3. run the snapshot bulk query (fatal on failure, partial results
//!    included) and load it
//! 4. classify and write `sync-delta.jsonl`
//! 5. creation pass: batched `productSet` bulk mutations, results merged
//!    into the snapshot
//! 6. re-classify, then the quantity pass: batched `inventorySetQuantities`
//! 7. write `sync-report.json`
//!
//! Failures inside a pass (conflict, staging, upload, download, bulk failure,
//! an unreadable result file) end that pass and are recorded in the report.
//! Rate limiting and cancellation end the run.

use crate::catalog::{CategoryMap, CategoryResolver};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::feed::{parse_feed_file, FeedSource};
use crate::progress;
use crate::reconcile::{
    apply_creation_results, batches, load_snapshot, DeltaKind, Reconciler, Snapshot,
};
use crate::shopify::queries::PRODUCT_SET_MUTATION;
use crate::shopify::types::QuantityUpdateLine;
use crate::shopify::{BulkOperationClient, GraphqlClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// A pass that ended early
#[derive(Debug, Clone, Serialize)]
pub struct PassError {
    pub pass: &'static str,
    pub batch: usize,
    pub error: String,
}

/// Summary written to `sync-report.json`
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub feed_source: String,
    pub feed_records: usize,
    pub feed_duplicates: usize,
    pub snapshot_skus: usize,
    pub new_records: usize,
    pub changed_records: usize,
    pub unchanged_records: usize,
    pub products_created: usize,
    pub product_failures: usize,
    pub quantities_submitted: usize,
    pub quantity_rejections: usize,
    pub bulk_operations: Vec<String>,
    pub pass_errors: Vec<PassError>,
    pub delta_file: PathBuf,
}

/// Drives a full sync run
pub struct SyncPipeline {
    config: SyncConfig,
    feed_source: Box<dyn FeedSource>,
    bulk: BulkOperationClient,
    cancel: CancellationToken,
}

impl SyncPipeline {
    pub fn new(
        config: SyncConfig,
        feed_source: Box<dyn FeedSource>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let graphql = GraphqlClient::new(&config.shopify)?;
        let bulk = BulkOperationClient::new(graphql)?;
        Ok(Self {
            config,
            feed_source,
            bulk,
            cancel,
        })
    }

    /// Run one sync and write the report
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        info!(run_id = %run_id, feed = %self.feed_source.describe(), "Starting sync run");

        std::fs::create_dir_all(&self.config.work_dir)?;

        // Step 1: category map
        let resolver = self.load_resolver()?;
        let reconciler = Reconciler::new(
            self.config.reconcile.clone(),
            resolver,
            self.config.shopify.location_id.clone(),
        );

        // Step 2: feed
        let feed_path = self.config.feed_path();
        self.feed_source.fetch(&feed_path).await?;
        let feed = parse_feed_file(&feed_path)?;
        self.check_cancelled()?;

        // Step 3: platform snapshot
        let snapshot_path = self.config.snapshot_path();
        let snapshot_run = self
            .bulk
            .fetch_snapshot(&snapshot_path, self.config.poll.options(), &self.cancel)
            .await?;
        let mut snapshot = load_snapshot(&snapshot_path)?;
        let snapshot_skus = snapshot.len();

        let mut report = SyncReport {
            run_id,
            started_at,
            finished_at: started_at,
            duration_seconds: 0.0,
            feed_source: self.feed_source.describe(),
            feed_records: feed.len(),
            feed_duplicates: feed.duplicates,
            snapshot_skus,
            new_records: 0,
            changed_records: 0,
            unchanged_records: 0,
            products_created: 0,
            product_failures: 0,
            quantities_submitted: 0,
            quantity_rejections: 0,
            bulk_operations: vec![snapshot_run.operation_id],
            pass_errors: Vec::new(),
            delta_file: self.config.delta_path(),
        };

        // Step 4: classification
        let delta = reconciler.classify(&feed, &snapshot);
        report.new_records = delta.count(DeltaKind::New);
        report.changed_records = delta.count(DeltaKind::Changed);
        report.unchanged_records = delta.count(DeltaKind::Unchanged);
        delta.write(&report.delta_file)?;
        info!(
            new = report.new_records,
            changed = report.changed_records,
            unchanged = report.unchanged_records,
            "Classified feed against snapshot"
        );

        // Step 5: creation pass
        let create_lines = reconciler.create_lines(&feed, &delta);
        self.creation_pass(&create_lines, &mut snapshot, &mut report)
            .await?;

        // Step 6: quantity pass
        let delta = reconciler.classify(&feed, &snapshot);
        let quantity_lines = reconciler.quantity_lines(&feed, &snapshot, &delta);
        self.quantity_pass(&quantity_lines, &mut report).await?;

        // Step 7: report
        report.finished_at = Utc::now();
        report.duration_seconds = start.elapsed().as_secs_f64();
        let report_path = self.config.report_path();
        std::fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;

        info!(
            run_id = %run_id,
            created = report.products_created,
            quantities = report.quantities_submitted,
            pass_errors = report.pass_errors.len(),
            duration_secs = report.duration_seconds,
            report = %report_path.display(),
            "Sync run complete"
        );
        Ok(report)
    }

    fn load_resolver(&self) -> Result<CategoryResolver> {
        let reconcile = &self.config.reconcile;
        let map = if reconcile.category_strict {
            CategoryMap::load(&reconcile.category_map_path)?
        } else {
            match CategoryMap::load_if_present(&reconcile.category_map_path)? {
                Some(map) => map,
                None => {
                    warn!(
                        path = %reconcile.category_map_path.display(),
                        "No category map; new products will be uncategorized"
                    );
                    CategoryMap::default()
                },
            }
        };
        let resolver = CategoryResolver::new(&map);
        resolver.validate(reconcile.category_strict)?;
        Ok(resolver)
    }

    #[instrument(skip_all, fields(pass = "create"))]
    async fn creation_pass(
        &self,
        lines: &[serde_json::Value],
        snapshot: &mut Snapshot,
        report: &mut SyncReport,
    ) -> Result<()> {
        if lines.is_empty() {
            info!("No new products to create");
            return Ok(());
        }

        let size = self.config.batch.create_batch_size;
        let total = lines.len().div_ceil(size);
        info!(products = lines.len(), batches = total, "Starting creation pass");

        for (index, batch) in batches(lines, size).enumerate() {
            if index > 0 {
                self.pause().await?;
            }

            let payload = self.config.create_payload_path(index);
            let result = self.config.create_result_path(index);
            rsr_common::jsonl::write_lines(&payload, batch)?;

            info!(batch = index + 1, of = total, lines = batch.len(), "Submitting product batch");
            let outcome = match self
                .bulk
                .run_bulk_mutation(
                    &payload,
                    PRODUCT_SET_MUTATION,
                    &result,
                    self.config.poll.options(),
                    &self.cancel,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal_for_run() => return Err(e),
                Err(e) => {
                    error!(batch = index + 1, error = %e, "Creation pass aborted");
                    report.pass_errors.push(PassError {
                        pass: "create",
                        batch: index + 1,
                        error: e.to_string(),
                    });
                    return Ok(());
                },
            };

            report.bulk_operations.push(outcome.operation_id.clone());
            if outcome.is_partial() {
                warn!(batch = index + 1, "Product batch finished with partial results");
            }
            if let Some(file) = &outcome.result_file {
                match apply_creation_results(file, snapshot) {
                    Ok(summary) => {
                        report.products_created += summary.created;
                        report.product_failures += summary.failures.len();
                    },
                    Err(e) => {
                        error!(batch = index + 1, error = %e, "Unreadable product results, creation pass aborted");
                        report.pass_errors.push(PassError {
                            pass: "create",
                            batch: index + 1,
                            error: e.to_string(),
                        });
                        return Ok(());
                    },
                }
            }
        }

        Ok(())
    }

    #[instrument(skip_all, fields(pass = "quantity"))]
    async fn quantity_pass(
        &self,
        lines: &[QuantityUpdateLine],
        report: &mut SyncReport,
    ) -> Result<()> {
        if lines.is_empty() {
            info!("No inventory quantities to update");
            return Ok(());
        }

        let size = self.config.batch.quantity_batch_size;
        info!(quantities = lines.len(), "Starting quantity pass");
        let total = lines.len().div_ceil(size);
        let pb = progress::create_pass_progress("quantity", lines.len() as u64);

        for (index, batch) in batches(lines, size).enumerate() {
            if index > 0 {
                self.pause().await?;
            }

            progress::set_batch(&pb, index + 1, total);
            match self.bulk.set_quantities(batch).await {
                Ok(rejected) => {
                    report.quantities_submitted += batch.len();
                    report.quantity_rejections += rejected.len();
                    pb.inc(batch.len() as u64);
                },
                Err(e) if e.is_fatal_for_run() => {
                    pb.abandon();
                    return Err(e);
                },
                Err(e) => {
                    pb.abandon();
                    error!(batch = index + 1, error = %e, "Quantity pass aborted");
                    report.pass_errors.push(PassError {
                        pass: "quantity",
                        batch: index + 1,
                        error: e.to_string(),
                    });
                    return Ok(());
                },
            }
        }

        pb.finish_and_clear();
        Ok(())
    }

    /// Fixed pause between batches; cancellable
    async fn pause(&self) -> Result<()> {
        let pause = self.config.batch.pause();
        if pause == Duration::ZERO {
            return self.check_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(SyncError::Cancelled),
            _ = tokio::time::sleep(pause) => Ok(()),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}
