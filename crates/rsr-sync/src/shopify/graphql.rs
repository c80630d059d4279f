//! Admin GraphQL transport
//!
//! Sends one query per call and unwraps the `{data, errors}` envelope. Throttling
//! (HTTP 429 or a `THROTTLED` error code) surfaces as [`SyncError::RateLimited`]
//! and is never retried here.

use crate::config::ShopifyConfig;
use crate::error::{Result, SyncError};
use crate::shopify::types::GraphQlResponse;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the Admin API access token.
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// GraphQL client bound to one store
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl GraphqlClient {
    /// Create a new client
    pub fn new(config: &ShopifyConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.graphql_endpoint(),
            access_token: config.access_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run `query` with `variables` and decode `data` as `T`
    pub async fn execute<T>(&self, query: &str, variables: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| secs.ceil() as u64);
            warn!(retry_after = ?retry_after, "Admin API throttled the request");
            return Err(SyncError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(format!(
                "Admin API returned HTTP {status}: {}",
                truncate(&body, 300)
            )));
        }

        let envelope: GraphQlResponse<T> = response.json().await?;

        if !envelope.errors.is_empty() {
            if envelope.errors.iter().any(|e| e.is_throttled()) {
                warn!("Admin API reported THROTTLED");
                return Err(SyncError::RateLimited(None));
            }
            let messages = envelope
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SyncError::GraphQl(messages));
        }

        debug!(endpoint = %self.endpoint, "GraphQL request succeeded");

        envelope
            .data
            .ok_or_else(|| SyncError::GraphQl("Response contained no data".to_string()))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
