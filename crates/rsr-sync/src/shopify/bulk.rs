//! Bulk operation lifecycle
//!
//! A bulk mutation is a four step exchange with the platform:
//!
//! 1. `stagedUploadsCreate` issues a short-lived upload target
//! 2. the NDJSON payload is POSTed to that target as a multipart form
//! 3. `bulkOperationRunMutation` references the upload by its `key` parameter
//! 4. `node(id:)` is polled until the operation reaches a terminal status,
//!    after which the result file is streamed to disk
//!
//! Bulk queries skip the first two steps. Only one bulk operation of each kind
//! may run per store; a second submission is rejected with
//! [`SyncError::Conflict`], which is surfaced and never retried.
//!
//! # Examples
//!
//! ```rust,ignore
//! let client = BulkOperationClient::new(GraphqlClient::new(&config.shopify)?)?;
//! let outcome = client
//!     .run_bulk_mutation(&payload, PRODUCT_SET_MUTATION, &results, poll, &cancel)
//!     .await?;
//! ```

use crate::error::{Result, SyncError};
use crate::progress;
use crate::shopify::graphql::GraphqlClient;
use crate::shopify::queries;
use crate::shopify::types::{
    BulkOperation, BulkOperationHandle, BulkOperationStatus, BulkRunMutationData,
    BulkRunPayload, BulkRunQueryData, InventorySetQuantitiesData, NodeData, QuantityUpdateLine,
    ResultLocation, StagedUpload, StagedUploadInput, StagedUploadsCreateData, UserError,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Connect timeout for staged uploads and result downloads. Transfers
/// themselves are unbounded because result files can be large.
pub const TRANSFER_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Polling behaviour of [`poll_until_done`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up with [`SyncError::PollTimeout`] after this long
    pub max_wait: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_POLL_INTERVAL_SECS),
            max_wait: None,
        }
    }
}

/// Anything that can report the current status of a bulk operation
#[async_trait]
pub trait BulkStatusSource: Send + Sync {
    async fn fetch_status(&self, id: &str) -> Result<BulkOperation>;
}

/// Poll `source` until the operation is terminal.
///
/// Cancelling `cancel` stops local polling only; the remote operation keeps
/// running.
pub async fn poll_until_done<S>(
    source: &S,
    handle: &BulkOperationHandle,
    options: PollOptions,
    cancel: &CancellationToken,
) -> Result<ResultLocation>
where
    S: BulkStatusSource + ?Sized,
{
    let started = Instant::now();
    info!(id = %handle.id, interval_secs = options.interval.as_secs(), "Polling bulk operation");

    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let operation = source.fetch_status(&handle.id).await?;
        debug!(
            id = %operation.id,
            status = ?operation.status,
            objects = ?operation.object_count,
            "Bulk operation status"
        );

        if operation.status.is_terminal() {
            info!(
                id = %operation.id,
                status = ?operation.status,
                objects = ?operation.object_count,
                elapsed_secs = started.elapsed().as_secs(),
                "Bulk operation finished"
            );
            return resolve_terminal(operation);
        }

        let mut pause = options.interval;
        if let Some(max_wait) = options.max_wait {
            let waited = started.elapsed();
            if waited >= max_wait {
                return Err(SyncError::PollTimeout {
                    id: handle.id.clone(),
                    waited_secs: waited.as_secs(),
                });
            }
            // Last poll lands on the deadline
            pause = pause.min(max_wait - waited);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(SyncError::Cancelled),
            _ = tokio::time::sleep(pause) => {}
        }
    }
}

/// Map a terminal status to where its output can be fetched
pub fn resolve_terminal(operation: BulkOperation) -> Result<ResultLocation> {
    match operation.status {
        BulkOperationStatus::Completed => Ok(match operation.url {
            Some(url) => ResultLocation::Url(url),
            None => ResultLocation::Empty,
        }),
        status => match operation.partial_data_url {
            Some(url) => {
                warn!(
                    id = %operation.id,
                    status = ?status,
                    error_code = ?operation.error_code,
                    "Bulk operation did not complete, partial results available"
                );
                Ok(ResultLocation::Partial(url))
            },
            None => Err(SyncError::BulkOperationFailed {
                id: operation.id,
                status,
                error_code: operation.error_code,
            }),
        },
    }
}

/// What a finished bulk run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkRunOutcome {
    pub operation_id: String,
    pub location: ResultLocation,
    /// Local copy of the result file, when there was one
    pub result_file: Option<PathBuf>,
}

impl BulkRunOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self.location, ResultLocation::Partial(_))
    }
}

/// Client for the bulk operation API
#[derive(Debug, Clone)]
pub struct BulkOperationClient {
    graphql: GraphqlClient,
    transfer: Client,
}

impl BulkOperationClient {
    pub fn new(graphql: GraphqlClient) -> Result<Self> {
        let transfer = Client::builder()
            .connect_timeout(Duration::from_secs(TRANSFER_CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { graphql, transfer })
    }

    pub fn graphql(&self) -> &GraphqlClient {
        &self.graphql
    }

    /// Ask for an upload target for `payload`.
    ///
    /// User errors are returned as [`SyncError::Staging`] and not retried.
    pub async fn stage_upload(&self, payload: &Path) -> Result<StagedUpload> {
        let filename = payload
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "payload.jsonl".to_string());

        let data: StagedUploadsCreateData = self
            .graphql
            .execute(
                queries::STAGED_UPLOADS_CREATE,
                json!({ "input": [StagedUploadInput::bulk_variables(filename)] }),
            )
            .await?;

        let created = data.staged_uploads_create;
        if !created.user_errors.is_empty() {
            return Err(SyncError::Staging(created.user_errors));
        }

        let target = created
            .staged_targets
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::Staging(Vec::new()))?;

        debug!(url = %target.url, "Staged upload target issued");
        Ok(target)
    }

    /// Upload `local_file` to `target` and return the path bulk mutations use.
    pub async fn upload_payload(&self, target: &StagedUpload, local_file: &Path) -> Result<String> {
        let upload_path = target
            .upload_path()
            .ok_or_else(|| SyncError::Upload("Staged target has no 'key' parameter".to_string()))?
            .to_string();

        let bytes = tokio::fs::read(local_file).await?;
        let size = bytes.len();
        let filename = local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "payload.jsonl".to_string());

        let mut form = Form::new();
        for param in &target.parameters {
            form = form.text(param.name.clone(), param.value.clone());
        }
        let file = Part::bytes(bytes)
            .file_name(filename)
            .mime_str("text/jsonl")
            .map_err(|e| SyncError::Upload(e.to_string()))?;
        form = form.part("file", file);

        let response = self
            .transfer
            .post(&target.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SyncError::Upload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Upload(format!(
                "Upload target returned HTTP {status}"
            )));
        }

        info!(path = %upload_path, bytes = size, "Uploaded bulk payload");
        Ok(upload_path)
    }

    /// Start a bulk query
    pub async fn submit_bulk_query(&self, query: &str) -> Result<BulkOperationHandle> {
        let data: BulkRunQueryData = self
            .graphql
            .execute(queries::BULK_OPERATION_RUN_QUERY, json!({ "query": query }))
            .await?;
        let handle = check_submission(data.bulk_operation_run_query)?;
        info!(id = %handle.id, status = ?handle.status, "Bulk query submitted");
        Ok(handle)
    }

    /// Start a bulk mutation applying `mutation` to every line at `upload_path`
    pub async fn submit_bulk_mutation(
        &self,
        upload_path: &str,
        mutation: &str,
    ) -> Result<BulkOperationHandle> {
        let data: BulkRunMutationData = self
            .graphql
            .execute(
                queries::BULK_OPERATION_RUN_MUTATION,
                json!({ "mutation": mutation, "stagedUploadPath": upload_path }),
            )
            .await?;
        let handle = check_submission(data.bulk_operation_run_mutation)?;
        info!(id = %handle.id, status = ?handle.status, "Bulk mutation submitted");
        Ok(handle)
    }

    /// Poll until `handle` is terminal
    pub async fn await_completion(
        &self,
        handle: &BulkOperationHandle,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<ResultLocation> {
        poll_until_done(self, handle, options, cancel).await
    }

    /// Stream the file at `url` to `destination`, returning the bytes written
    pub async fn download_result(&self, url: &str, destination: &Path) -> Result<u64> {
        let download_error = |message: String| SyncError::Download {
            url: url.to_string(),
            message,
        };

        let response = self
            .transfer
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(destination).await?;

        let label = destination
            .file_name()
            .map(|n| format!("Downloading {}", n.to_string_lossy()))
            .unwrap_or_else(|| "Downloading bulk results".to_string());
        let pb = progress::create_download_progress(response.content_length(), &label);

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| download_error(e.to_string()))?;
            written += chunk.len() as u64;
            pb.set_position(written);
        }
        file.flush().await.map_err(|e| download_error(e.to_string()))?;
        pb.finish_and_clear();

        info!(path = %destination.display(), bytes = written, "Downloaded bulk results");
        Ok(written)
    }

    /// Set absolute `available` quantities for one batch.
    ///
    /// Per-line rejections come back as user errors rather than an `Err`.
    pub async fn set_quantities(&self, batch: &[QuantityUpdateLine]) -> Result<Vec<UserError>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let data: InventorySetQuantitiesData = self
            .graphql
            .execute(
                queries::INVENTORY_SET_QUANTITIES,
                json!({
                    "input": {
                        "name": "available",
                        "reason": "correction",
                        "ignoreCompareQuantity": true,
                        "quantities": batch,
                    }
                }),
            )
            .await?;

        let errors = data.inventory_set_quantities.user_errors;
        for error in &errors {
            warn!(
                field = ?error.field_path(),
                code = ?error.code,
                "Quantity rejected: {}",
                error.message
            );
        }
        Ok(errors)
    }

    /// Stage, upload, submit, await and download one bulk mutation
    pub async fn run_bulk_mutation(
        &self,
        payload_file: &Path,
        mutation: &str,
        result_file: &Path,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<BulkRunOutcome> {
        let target = self.stage_upload(payload_file).await?;
        let upload_path = self.upload_payload(&target, payload_file).await?;
        let handle = self.submit_bulk_mutation(&upload_path, mutation).await?;
        let location = self.await_completion(&handle, options, cancel).await?;

        let result_file = match location.url() {
            Some(url) => {
                self.download_result(url, result_file).await?;
                Some(result_file.to_path_buf())
            },
            None => None,
        };

        Ok(BulkRunOutcome {
            operation_id: handle.id,
            location,
            result_file,
        })
    }

    /// Run the product snapshot query and write its result to `destination`.
    ///
    /// A store without products yields an empty file. A query that ends
    /// without completing is an error even when partial data exists.
    pub async fn fetch_snapshot(
        &self,
        destination: &Path,
        options: PollOptions,
        cancel: &CancellationToken,
    ) -> Result<BulkRunOutcome> {
        let handle = self.submit_bulk_query(queries::PRODUCT_SNAPSHOT_QUERY).await?;
        let location = self.await_completion(&handle, options, cancel).await?;

        match &location {
            ResultLocation::Url(url) => {
                self.download_result(url, destination).await?;
            },
            ResultLocation::Partial(_) => {
                return Err(SyncError::Snapshot(format!(
                    "Snapshot query {} did not complete; partial results cannot stand in for the full inventory",
                    handle.id
                )));
            },
            ResultLocation::Empty => {
                info!("Snapshot query returned no results, writing empty snapshot");
                if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(destination, b"").await?;
            },
        }

        Ok(BulkRunOutcome {
            operation_id: handle.id,
            location,
            result_file: Some(destination.to_path_buf()),
        })
    }
}

#[async_trait]
impl BulkStatusSource for BulkOperationClient {
    async fn fetch_status(&self, id: &str) -> Result<BulkOperation> {
        let data: NodeData<BulkOperation> = self
            .graphql
            .execute(queries::BULK_OPERATION_STATUS, json!({ "id": id }))
            .await?;
        data.node
            .ok_or_else(|| SyncError::GraphQl(format!("Bulk operation {id} not found")))
    }
}

/// Whether a submission was rejected because another operation is running
pub fn is_conflict(error: &UserError) -> bool {
    error.code.as_deref() == Some("OPERATION_IN_PROGRESS")
        || error.message.to_lowercase().contains("already in progress")
}

fn check_submission(payload: BulkRunPayload) -> Result<BulkOperationHandle> {
    if let Some(conflict) = payload.user_errors.iter().find(|e| is_conflict(e)) {
        return Err(SyncError::Conflict(conflict.message.clone()));
    }
    if let Some(error) = payload.user_errors.first() {
        return Err(SyncError::validation(error));
    }
    payload
        .bulk_operation
        .ok_or_else(|| SyncError::GraphQl("Submission returned no bulk operation".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        statuses: Mutex<VecDeque<BulkOperation>>,
        calls: Mutex<u32>,
        cancel_after_first: Option<CancellationToken>,
    }

    impl ScriptedSource {
        fn new(statuses: Vec<BulkOperation>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                calls: Mutex::new(0),
                cancel_after_first: None,
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BulkStatusSource for ScriptedSource {
        async fn fetch_status(&self, id: &str) -> Result<BulkOperation> {
            *self.calls.lock().unwrap() += 1;
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            let mut statuses = self.statuses.lock().unwrap();
            let next = if statuses.len() > 1 {
                statuses.pop_front()
            } else {
                statuses.front().cloned()
            };
            Ok(next.unwrap_or_else(|| op(id, BulkOperationStatus::Running, None, None)))
        }
    }

    fn op(
        id: &str,
        status: BulkOperationStatus,
        url: Option<&str>,
        partial: Option<&str>,
    ) -> BulkOperation {
        BulkOperation {
            id: id.to_string(),
            status,
            error_code: None,
            object_count: None,
            url: url.map(str::to_string),
            partial_data_url: partial.map(str::to_string),
        }
    }

    fn handle() -> BulkOperationHandle {
        BulkOperationHandle {
            id: "gid://shopify/BulkOperation/1".into(),
            status: BulkOperationStatus::Created,
        }
    }

    fn options() -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(25),
            max_wait: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_two_waits() {
        let id = "gid://shopify/BulkOperation/1";
        let source = ScriptedSource::new(vec![
            op(id, BulkOperationStatus::Running, None, None),
            op(id, BulkOperationStatus::Running, None, None),
            op(id, BulkOperationStatus::Completed, Some("https://x/result.jsonl"), None),
        ]);

        let started = Instant::now();
        let location = poll_until_done(&source, &handle(), options(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(location, ResultLocation::Url("https://x/result.jsonl".into()));
        assert_eq!(source.calls(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_without_partial_data() {
        let id = "gid://shopify/BulkOperation/1";
        let source = ScriptedSource::new(vec![
            op(id, BulkOperationStatus::Running, None, None),
            op(id, BulkOperationStatus::Failed, None, None),
        ]);

        let err = poll_until_done(&source, &handle(), options(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::BulkOperationFailed {
                status: BulkOperationStatus::Failed,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_with_partial_data() {
        let id = "gid://shopify/BulkOperation/1";
        let source = ScriptedSource::new(vec![op(
            id,
            BulkOperationStatus::Expired,
            None,
            Some("https://x/partial.jsonl"),
        )]);

        let location = poll_until_done(&source, &handle(), options(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(location, ResultLocation::Partial("https://x/partial.jsonl".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_url_is_empty() {
        let source = ScriptedSource::new(vec![op(
            "gid://shopify/BulkOperation/1",
            BulkOperationStatus::Completed,
            None,
            None,
        )]);

        let location = poll_until_done(&source, &handle(), options(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(location, ResultLocation::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_wait_times_out() {
        let source = ScriptedSource::new(vec![op(
            "gid://shopify/BulkOperation/1",
            BulkOperationStatus::Running,
            None,
            None,
        )]);
        let options = PollOptions {
            interval: Duration::from_secs(25),
            max_wait: Some(Duration::from_secs(60)),
        };

        let started = Instant::now();
        let err = poll_until_done(&source, &handle(), options, &CancellationToken::new())
            .await
            .unwrap_err();

        // Polls at 0s, 25s, 50s, then a shortened wait up to the 60s deadline
        match err {
            SyncError::PollTimeout { waited_secs, .. } => assert_eq!(waited_secs, 60),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let cancel = CancellationToken::new();
        let mut source = ScriptedSource::new(vec![op(
            "gid://shopify/BulkOperation/1",
            BulkOperationStatus::Running,
            None,
            None,
        )]);
        source.cancel_after_first = Some(cancel.clone());

        let err = poll_until_done(&source, &handle(), options(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn test_conflict_detection() {
        let by_code = UserError {
            field: None,
            message: "A bulk mutation operation for this app and shop is already running.".into(),
            code: Some("OPERATION_IN_PROGRESS".into()),
        };
        let by_message = UserError {
            field: None,
            message: "A bulk query operation for this app and shop is already in progress".into(),
            code: None,
        };
        let other = UserError {
            field: Some(vec!["mutation".into()]),
            message: "Invalid mutation".into(),
            code: Some("INVALID_MUTATION".into()),
        };

        assert!(is_conflict(&by_code));
        assert!(is_conflict(&by_message));
        assert!(!is_conflict(&other));

        let err = check_submission(BulkRunPayload {
            bulk_operation: None,
            user_errors: vec![other],
        })
        .unwrap_err();
        assert!(matches!(err, SyncError::Validation { .. }));
    }
}
