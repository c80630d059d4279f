//! Department collection provisioning
//!
//! Looks up the storefront collection for every department handle and, in
//! [`CollectionMode::Create`], creates the ones that are missing. The result is
//! written as the category map file consumed by [`super::CategoryResolver`].

use crate::catalog::category::{unique_collections, CategoryEntry, CategoryMap, Department};
use crate::config::CollectionMode;
use crate::error::{Result, SyncError};
use crate::shopify::graphql::GraphqlClient;
use crate::shopify::queries;
use crate::shopify::types::{Collection, CollectionByHandleData, CollectionCreateData};
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of a provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub found: usize,
    pub created: usize,
    /// Handles that are missing (fetch mode) or failed to create
    pub missing: Vec<String>,
}

/// Fetches or creates the department collections
pub struct CollectionProvisioner<'a> {
    client: &'a GraphqlClient,
    mode: CollectionMode,
}

impl<'a> CollectionProvisioner<'a> {
    pub fn new(client: &'a GraphqlClient, mode: CollectionMode) -> Self {
        Self { client, mode }
    }

    /// Resolve every department collection and return the category map
    pub async fn provision(&self) -> Result<(CategoryMap, ProvisionSummary)> {
        let mut map = CategoryMap::default();
        let mut summary = ProvisionSummary::default();

        info!(mode = %self.mode, "Provisioning department collections");

        for department in unique_collections() {
            let collection = match self.fetch(department.handle).await? {
                Some(collection) => {
                    summary.found += 1;
                    Some(collection)
                },
                None if self.mode == CollectionMode::Create => {
                    match self.create(department).await {
                        Ok(collection) => {
                            summary.created += 1;
                            Some(collection)
                        },
                        Err(e) if e.is_fatal_for_run() => return Err(e),
                        Err(e) => {
                            warn!(handle = department.handle, error = %e, "Failed to create collection");
                            None
                        },
                    }
                },
                None => {
                    warn!(
                        handle = department.handle,
                        "Collection does not exist, skipping (COLLECTION_MODE=fetch)"
                    );
                    None
                },
            };

            match collection {
                Some(c) => map.entries.push(CategoryEntry {
                    title: c.title,
                    handle: c.handle,
                    gid: c.id,
                }),
                None => summary.missing.push(department.handle.to_string()),
            }
        }

        info!(
            found = summary.found,
            created = summary.created,
            missing = summary.missing.len(),
            "Collection provisioning finished"
        );
        Ok((map, summary))
    }

    /// Provision and write the category map to `path`
    pub async fn provision_to_file(&self, path: &Path) -> Result<ProvisionSummary> {
        let (map, summary) = self.provision().await?;
        map.save(path)?;
        info!(path = %path.display(), entries = map.entries.len(), "Wrote category map");
        Ok(summary)
    }

    async fn fetch(&self, handle: &str) -> Result<Option<Collection>> {
        let data: CollectionByHandleData = self
            .client
            .execute(queries::COLLECTION_BY_HANDLE, json!({ "handle": handle }))
            .await?;
        Ok(data.collection_by_handle)
    }

    async fn create(&self, department: &Department) -> Result<Collection> {
        let data: CollectionCreateData = self
            .client
            .execute(
                queries::COLLECTION_CREATE,
                json!({ "input": { "title": department.title, "handle": department.handle } }),
            )
            .await?;

        let payload = data.collection_create;
        if let Some(error) = payload.user_errors.first() {
            return Err(SyncError::validation(error));
        }
        let collection = payload.collection.ok_or_else(|| {
            SyncError::GraphQl(format!("collectionCreate returned no collection for {}", department.handle))
        })?;
        info!(handle = %collection.handle, id = %collection.id, "Created collection");
        Ok(collection)
    }
}
