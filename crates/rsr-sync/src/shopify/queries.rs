//! GraphQL documents sent to the Admin API

pub const STAGED_UPLOADS_CREATE: &str = r#"
mutation stagedUploadsCreate($input: [StagedUploadInput!]!) {
  stagedUploadsCreate(input: $input) {
    stagedTargets {
      url
      resourceUrl
      parameters { name value }
    }
    userErrors { field message }
  }
}"#;

pub const BULK_OPERATION_RUN_QUERY: &str = r#"
mutation bulkOperationRunQuery($query: String!) {
  bulkOperationRunQuery(query: $query) {
    bulkOperation { id status }
    userErrors { field message code }
  }
}"#;

pub const BULK_OPERATION_RUN_MUTATION: &str = r#"
mutation bulkOperationRunMutation($mutation: String!, $stagedUploadPath: String!) {
  bulkOperationRunMutation(mutation: $mutation, stagedUploadPath: $stagedUploadPath) {
    bulkOperation { id status }
    userErrors { field message code }
  }
}"#;

pub const BULK_OPERATION_STATUS: &str = r#"
query bulkOperationStatus($id: ID!) {
  node(id: $id) {
    ... on BulkOperation {
      id
      status
      errorCode
      objectCount
      url
      partialDataUrl
    }
  }
}"#;

/// Bulk query producing the platform inventory snapshot.
///
/// The result file has one line per product, per media item and per variant;
/// nested lines carry `__parentId`.
pub const PRODUCT_SNAPSHOT_QUERY: &str = r#"
{
  products {
    edges {
      node {
        id
        media {
          edges {
            node { id }
          }
        }
        variants {
          edges {
            node {
              sku
              inventoryQuantity
              inventoryItem { id }
            }
          }
        }
      }
    }
  }
}"#;

/// Mutation template applied to every line of a creation payload.
pub const PRODUCT_SET_MUTATION: &str = r#"
mutation productSet($input: ProductSetInput!) {
  productSet(synchronous: true, input: $input) {
    product {
      id
      variants(first: 5) {
        edges {
          node {
            sku
            inventoryQuantity
            inventoryItem { id }
          }
        }
      }
    }
    userErrors { field message code }
  }
}"#;

pub const INVENTORY_SET_QUANTITIES: &str = r#"
mutation inventorySetQuantities($input: InventorySetQuantitiesInput!) {
  inventorySetQuantities(input: $input) {
    inventoryAdjustmentGroup {
      reason
      changes { name delta quantityAfterChange }
    }
    userErrors { code field message }
  }
}"#;

pub const COLLECTION_BY_HANDLE: &str = r#"
query collectionByHandle($handle: String!) {
  collectionByHandle(handle: $handle) { id title handle }
}"#;

pub const COLLECTION_CREATE: &str = r#"
mutation collectionCreate($input: CollectionInput!) {
  collectionCreate(input: $input) {
    collection { id title handle }
    userErrors { field message }
  }
}"#;
