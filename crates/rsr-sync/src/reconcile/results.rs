//! Reading `productSet` bulk results back into the snapshot

use crate::error::{Result, SyncError};
use crate::reconcile::snapshot::{PlatformInventoryEntry, Snapshot};
use crate::shopify::types::UserError;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: T,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    sku: Option<String>,
    #[serde(default)]
    inventory_quantity: Option<i64>,
    inventory_item: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct CreatedProduct {
    id: String,
    variants: Option<Connection<VariantNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSetPayload {
    product: Option<CreatedProduct>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultData {
    product_set: Option<ProductSetPayload>,
}

#[derive(Debug, Deserialize)]
struct LineError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultLine {
    #[serde(default)]
    data: Option<ResultData>,
    #[serde(default)]
    errors: Vec<LineError>,
    #[serde(default, rename = "__lineNumber")]
    line_number: Option<u64>,
}

/// A payload line the platform rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationFailure {
    /// Zero-based line of the uploaded payload
    pub line: Option<u64>,
    pub field: Option<String>,
    pub message: String,
}

/// Tally of a creation result file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationSummary {
    pub created: usize,
    pub failures: Vec<CreationFailure>,
}

/// Merge the variants of successfully created products into `snapshot`.
///
/// Lines with user errors are logged and skipped; they never fail the call.
pub fn apply_creation_results(result_file: &Path, snapshot: &mut Snapshot) -> Result<CreationSummary> {
    let mut summary = CreationSummary::default();

    rsr_common::jsonl::for_each_line(result_file, |line: ResultLine| {
        if let Some(error) = line.errors.first() {
            summary.failures.push(CreationFailure {
                line: line.line_number,
                field: None,
                message: error.message.clone(),
            });
            return Ok(());
        }

        let Some(payload) = line.data.and_then(|d| d.product_set) else {
            return Ok(());
        };

        if let Some(error) = payload.user_errors.first() {
            warn!(
                line = ?line.line_number,
                field = ?error.field_path(),
                "Product rejected: {}",
                error.message
            );
            summary.failures.push(CreationFailure {
                line: line.line_number,
                field: error.field_path(),
                message: error.message.clone(),
            });
            return Ok(());
        }

        let Some(product) = payload.product else {
            return Ok(());
        };
        summary.created += 1;

        let variants = product.variants.map(|c| c.edges).unwrap_or_default();
        for variant in variants.into_iter().map(|e| e.node) {
            if let (Some(sku), Some(item)) = (variant.sku, variant.inventory_item) {
                snapshot.insert(PlatformInventoryEntry {
                    sku,
                    quantity: variant.inventory_quantity.unwrap_or(0),
                    product_id: Some(product.id.clone()),
                    inventory_item_id: item.id,
                    media_ids: Vec::new(),
                });
            }
        }
        Ok(())
    })
    .map_err(|e| SyncError::Snapshot(format!("{}: {e}", result_file.display())))?;

    for failure in &summary.failures {
        if failure.field.is_none() {
            warn!(line = ?failure.line, "Product line failed: {}", failure.message);
        }
    }

    info!(
        created = summary.created,
        failed = summary.failures.len(),
        "Applied product creation results"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_creation_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"data":{"productSet":{"product":{"id":"gid://shopify/Product/10","variants":{"edges":[{"node":{"sku":"A2","inventoryQuantity":0,"inventoryItem":{"id":"gid://shopify/InventoryItem/20"}}}]}},"userErrors":[]}},"__lineNumber":0}"#, "\n",
                r#"{"data":{"productSet":{"product":null,"userErrors":[{"field":["input","variants","0","price"],"message":"Price must be positive","code":"INVALID"}]}},"__lineNumber":1}"#, "\n",
                r#"{"errors":[{"message":"Internal error"}],"__lineNumber":2}"#, "\n",
            ),
        )
        .unwrap();

        let mut snapshot = Snapshot::default();
        let summary = apply_creation_results(&path, &mut snapshot).unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.failures[0].line, Some(1));
        assert_eq!(summary.failures[0].field.as_deref(), Some("input.variants.0.price"));

        let a2 = snapshot.get("A2").unwrap();
        assert_eq!(a2.quantity, 0);
        assert_eq!(a2.inventory_item_id, "gid://shopify/InventoryItem/20");
        assert_eq!(a2.product_id.as_deref(), Some("gid://shopify/Product/10"));
    }
}
