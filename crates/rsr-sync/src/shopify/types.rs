//! Admin API request and response shapes

use serde::{Deserialize, Serialize};

/// Error attached to a mutation payload (`userErrors`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl UserError {
    /// Dotted field path, e.g. `input.variants.0.sku`
    pub fn field_path(&self) -> Option<String> {
        self.field
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(|f| f.join("."))
    }
}

/// Top-level GraphQL error entry
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphQlError {
    pub fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|c| c.eq_ignore_ascii_case("THROTTLED"))
    }
}

/// GraphQL response envelope
#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

// ============================================================================
// Bulk operations
// ============================================================================

/// Remote status of a bulk operation.
///
/// `Created` is the queued state; `Canceling` is transient. Everything else
/// besides `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperationStatus {
    #[serde(alias = "QUEUED")]
    Created,
    Running,
    Canceling,
    Completed,
    Failed,
    Canceled,
    Expired,
}

impl BulkOperationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Canceled | Self::Expired
        )
    }
}

/// Identifier and last known status of a submitted bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationHandle {
    pub id: String,
    pub status: BulkOperationStatus,
}

/// Full status record returned by `node(id:)`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperation {
    pub id: String,
    pub status: BulkOperationStatus,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default, deserialize_with = "count_from_string")]
    pub object_count: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub partial_data_url: Option<String>,
}

/// `objectCount` and `fileSize` are `UnsignedInt64` scalars, serialized as strings.
fn count_from_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Num(n)) => Some(n),
        Some(Raw::Str(s)) => s.parse().ok(),
        None => None,
    })
}

/// Where the output of a finished bulk operation lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLocation {
    /// COMPLETED with a result file
    Url(String),
    /// FAILED/CANCELED/EXPIRED, but some objects were processed
    Partial(String),
    /// COMPLETED with nothing to report
    Empty,
}

impl ResultLocation {
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) | Self::Partial(url) => Some(url),
            Self::Empty => None,
        }
    }
}

// ============================================================================
// Staged uploads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedUploadParameter {
    pub name: String,
    pub value: String,
}

/// Short-lived upload target issued by `stagedUploadsCreate`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedUpload {
    pub url: String,
    #[serde(default)]
    pub resource_url: Option<String>,
    pub parameters: Vec<StagedUploadParameter>,
}

impl StagedUpload {
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Path a bulk mutation uses to reference the uploaded file
    pub fn upload_path(&self) -> Option<&str> {
        self.parameter("key")
    }
}

/// Description of the file a staged upload is requested for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedUploadInput {
    pub resource: &'static str,
    pub filename: String,
    pub mime_type: &'static str,
    pub http_method: &'static str,
}

impl StagedUploadInput {
    pub fn bulk_variables(filename: impl Into<String>) -> Self {
        Self {
            resource: "BULK_MUTATION_VARIABLES",
            filename: filename.into(),
            mime_type: "text/jsonl",
            http_method: "POST",
        }
    }
}

// ============================================================================
// Mutation payloads
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StagedUploadsCreateData {
    pub staged_uploads_create: StagedUploadsCreatePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StagedUploadsCreatePayload {
    #[serde(default)]
    pub staged_targets: Vec<StagedUpload>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkRunPayload {
    pub bulk_operation: Option<BulkOperationHandle>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkRunQueryData {
    pub bulk_operation_run_query: BulkRunPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkRunMutationData {
    pub bulk_operation_run_mutation: BulkRunPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeData<T> {
    pub node: Option<T>,
}

/// One entry of an absolute `inventorySetQuantities` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityUpdateLine {
    pub inventory_item_id: String,
    pub location_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InventorySetQuantitiesData {
    pub inventory_set_quantities: InventorySetQuantitiesPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InventorySetQuantitiesPayload {
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

// ============================================================================
// Collections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionByHandleData {
    pub collection_by_handle: Option<Collection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionCreateData {
    pub collection_create: CollectionCreatePayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CollectionCreatePayload {
    pub collection: Option<Collection>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bulk_operation_deserializes_string_counts() {
        let op: BulkOperation = serde_json::from_value(json!({
            "id": "gid://shopify/BulkOperation/1",
            "status": "COMPLETED",
            "errorCode": null,
            "objectCount": "42",
            "url": "https://storage.example.com/result.jsonl",
            "partialDataUrl": null
        }))
        .unwrap();

        assert_eq!(op.status, BulkOperationStatus::Completed);
        assert_eq!(op.object_count, Some(42));
        assert_eq!(op.partial_data_url, None);
    }

    #[test]
    fn test_queued_alias() {
        let status: BulkOperationStatus = serde_json::from_value(json!("QUEUED")).unwrap();
        assert_eq!(status, BulkOperationStatus::Created);
        assert!(!status.is_terminal());
        assert!(BulkOperationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_staged_upload_path_is_key_parameter() {
        let target: StagedUpload = serde_json::from_value(json!({
            "url": "https://uploads.example.com/",
            "resourceUrl": null,
            "parameters": [
                {"name": "Content-Type", "value": "text/jsonl"},
                {"name": "key", "value": "tmp/42/bulk/products.jsonl"}
            ]
        }))
        .unwrap();

        assert_eq!(target.upload_path(), Some("tmp/42/bulk/products.jsonl"));
        assert_eq!(target.parameter("missing"), None);
    }

    #[test]
    fn test_user_error_field_path() {
        let err = UserError {
            field: Some(vec![]),
            message: "bad".into(),
            code: None,
        };
        assert_eq!(err.field_path(), None);
    }
}
