//! Configuration management
//!
//! Everything the sync needs is read once from the environment (after loading
//! a `.env` file, if present) into an explicit [`SyncConfig`] and validated
//! before any network traffic happens.

use crate::error::{Result, SyncError};
use crate::shopify::bulk::PollOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// FTP Constants
// ============================================================================

/// Default FTP port of the distributor's dropship server.
pub const DEFAULT_FTP_PORT: u16 = 2222;

/// Default remote path of the inventory feed.
pub const DEFAULT_FTP_REMOTE_PATH: &str = "/ftpdownloads/fulfillment-inv-new.txt";

// ============================================================================
// Platform Constants
// ============================================================================

/// Default Admin API version.
pub const DEFAULT_API_VERSION: &str = "2024-07";

/// Default timeout for a single GraphQL request in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Default interval between bulk operation status checks in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 25;

// ============================================================================
// Reconciliation Constants
// ============================================================================

/// Default working directory for downloaded and generated files.
pub const DEFAULT_WORK_DIR: &str = "./sync-data";

/// Default category map file, produced by `rsr-sync collections`.
pub const DEFAULT_CATEGORY_MAP: &str = "./collections.json";

/// Default product image URL. `{image}` is the feed's image name, `{sku}` the stock number.
pub const DEFAULT_IMAGE_URL_TEMPLATE: &str = "https://img.rsrgroup.com/pimages/{image}";

/// Default number of product lines per creation bulk operation.
pub const DEFAULT_CREATE_BATCH_SIZE: usize = 200;

/// Default number of quantities per `inventorySetQuantities` call.
pub const DEFAULT_QUANTITY_BATCH_SIZE: usize = 150;

/// Default pause between batches in milliseconds.
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 2000;

/// What the collection provisioner does with a department collection that
/// does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// Create the missing collection
    Create,
    /// Only look collections up; missing ones are reported and skipped
    #[default]
    Fetch,
}

impl FromStr for CollectionMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "fetch" => Ok(Self::Fetch),
            other => Err(SyncError::config(format!(
                "COLLECTION_MODE must be 'create' or 'fetch', got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Fetch => write!(f, "fetch"),
        }
    }
}

/// Full sync configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub ftp: FtpConfig,
    pub shopify: ShopifyConfig,
    pub reconcile: ReconcileConfig,
    pub batch: BatchConfig,
    pub poll: PollConfig,
    pub collection_mode: CollectionMode,
    pub work_dir: PathBuf,
}

/// Feed server connection
#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Upgrade the control connection with explicit TLS (AUTH TLS)
    pub secure: bool,
    pub remote_path: String,
}

/// Admin API connection
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Store domain (`example.myshopify.com`), bare store name, or full base URL
    pub store_domain: String,
    pub api_version: String,
    pub access_token: String,
    /// Location gid inventory quantities are set at
    pub location_id: String,
    pub http_timeout_secs: u64,
}

/// Payload building options
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub category_map_path: PathBuf,
    /// Refuse to run when the category map misses a department
    pub category_strict: bool,
    /// Collection assigned to products whose department has no collection
    pub uncategorized_gid: Option<String>,
    pub image_url_template: String,
}

/// Batching of outbound work
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub create_batch_size: usize,
    pub quantity_batch_size: usize,
    pub pause_ms: u64,
}

impl BatchConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            create_batch_size: DEFAULT_CREATE_BATCH_SIZE,
            quantity_batch_size: DEFAULT_QUANTITY_BATCH_SIZE,
            pause_ms: DEFAULT_BATCH_PAUSE_MS,
        }
    }
}

/// Bulk operation polling
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub max_wait_secs: Option<u64>,
}

impl PollConfig {
    pub fn options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.interval_secs),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
        }
    }
}

impl ShopifyConfig {
    /// GraphQL endpoint for the configured store and API version
    pub fn graphql_endpoint(&self) -> String {
        let domain = self.store_domain.trim().trim_end_matches('/');
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else if domain.contains('.') {
            format!("https://{domain}")
        } else {
            format!("https://{domain}.myshopify.com")
        };
        format!("{base}/admin/api/{}/graphql.json", self.api_version)
    }
}

/// Accept a bare numeric location id or a full gid.
pub fn location_gid(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("gid://") {
        raw.to_string()
    } else {
        format!("gid://shopify/Location/{raw}")
    }
}

impl SyncConfig {
    /// Load configuration from the environment, after reading `.env`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = SyncConfig {
            ftp: FtpConfig {
                host: get("FTP_HOST").unwrap_or_default(),
                port: parse_or(&get, "FTP_PORT", DEFAULT_FTP_PORT)?,
                username: get("FTP_USER").unwrap_or_default(),
                password: get("FTP_PASSWORD").unwrap_or_default(),
                secure: parse_bool(&get, "FTP_SECURE", true)?,
                remote_path: get("FTP_REMOTE_PATH")
                    .unwrap_or_else(|| DEFAULT_FTP_REMOTE_PATH.to_string()),
            },
            shopify: ShopifyConfig {
                store_domain: get("SHOPIFY_STORE_DOMAIN")
                    .or_else(|| get("SHOPIFY_STORE_NAME"))
                    .unwrap_or_default(),
                api_version: get("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                access_token: get("SHOPIFY_ACCESS_TOKEN").unwrap_or_default(),
                location_id: get("SHOPIFY_LOCATION_ID")
                    .map(|v| location_gid(&v))
                    .unwrap_or_default(),
                http_timeout_secs: parse_or(&get, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            },
            reconcile: ReconcileConfig {
                category_map_path: get("SYNC_CATEGORY_MAP")
                    .unwrap_or_else(|| DEFAULT_CATEGORY_MAP.to_string())
                    .into(),
                category_strict: parse_bool(&get, "SYNC_CATEGORY_STRICT", false)?,
                uncategorized_gid: get("SYNC_UNCATEGORIZED_GID"),
                image_url_template: get("SYNC_IMAGE_URL_TEMPLATE")
                    .unwrap_or_else(|| DEFAULT_IMAGE_URL_TEMPLATE.to_string()),
            },
            batch: BatchConfig {
                create_batch_size: parse_or(&get, "SYNC_CREATE_BATCH_SIZE", DEFAULT_CREATE_BATCH_SIZE)?,
                quantity_batch_size: parse_or(
                    &get,
                    "SYNC_QUANTITY_BATCH_SIZE",
                    DEFAULT_QUANTITY_BATCH_SIZE,
                )?,
                pause_ms: parse_or(&get, "SYNC_BATCH_PAUSE_MS", DEFAULT_BATCH_PAUSE_MS)?,
            },
            poll: PollConfig {
                interval_secs: parse_or(&get, "BULK_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
                max_wait_secs: get("BULK_MAX_WAIT_SECS")
                    .map(|v| parse_value::<u64>("BULK_MAX_WAIT_SECS", &v))
                    .transpose()?,
            },
            collection_mode: get("COLLECTION_MODE")
                .map(|v| v.parse::<CollectionMode>())
                .transpose()?
                .unwrap_or_default(),
            work_dir: get("SYNC_WORK_DIR")
                .unwrap_or_else(|| DEFAULT_WORK_DIR.to_string())
                .into(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration needed by every command
    pub fn validate(&self) -> Result<()> {
        if self.shopify.store_domain.is_empty() {
            return Err(SyncError::config("SHOPIFY_STORE_DOMAIN is required"));
        }
        if self.shopify.access_token.is_empty() {
            return Err(SyncError::config("SHOPIFY_ACCESS_TOKEN is required"));
        }
        if self.shopify.http_timeout_secs == 0 {
            return Err(SyncError::config("HTTP_TIMEOUT_SECS must be greater than 0"));
        }
        if self.batch.create_batch_size == 0 || self.batch.quantity_batch_size == 0 {
            return Err(SyncError::config("Batch sizes must be greater than 0"));
        }
        if self.poll.interval_secs == 0 {
            return Err(SyncError::config("BULK_POLL_INTERVAL_SECS must be greater than 0"));
        }
        if self.ftp.port == 0 {
            return Err(SyncError::config("FTP_PORT must be greater than 0"));
        }
        Ok(())
    }

    /// Validate the extra settings a full sync run needs.
    ///
    /// FTP settings are only checked when the feed comes from the server.
    pub fn validate_for_run(&self, local_feed: bool) -> Result<()> {
        if !local_feed {
            if self.ftp.host.is_empty() {
                return Err(SyncError::config("FTP_HOST is required"));
            }
            if self.ftp.username.is_empty() {
                return Err(SyncError::config("FTP_USER is required"));
            }
        }
        if self.shopify.location_id.is_empty() {
            return Err(SyncError::config("SHOPIFY_LOCATION_ID is required"));
        }
        Ok(())
    }

    /// Local copy of the distributor feed
    pub fn feed_path(&self) -> PathBuf {
        self.work_dir.join("rsr-inventory.txt")
    }

    /// Platform inventory snapshot downloaded from the bulk query
    pub fn snapshot_path(&self) -> PathBuf {
        self.work_dir.join("shopify-inventory.jsonl")
    }

    /// Classification audit file
    pub fn delta_path(&self) -> PathBuf {
        self.work_dir.join("sync-delta.jsonl")
    }

    /// Run summary
    pub fn report_path(&self) -> PathBuf {
        self.work_dir.join("sync-report.json")
    }

    /// Staged `productSet` payload for creation batch `index`
    pub fn create_payload_path(&self, index: usize) -> PathBuf {
        self.work_dir.join(format!("productset-inputs-{index:03}.jsonl"))
    }

    /// Bulk result file for creation batch `index`
    pub fn create_result_path(&self, index: usize) -> PathBuf {
        self.work_dir.join(format!("productset-results-{index:03}.jsonl"))
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SyncError::config(format!("{key} has an invalid value '{raw}'")))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    get(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_bool<G>(get: &G, key: &str, default: bool) -> Result<bool>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(SyncError::config(format!("{key} must be a boolean, got '{v}'"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("SHOPIFY_STORE_DOMAIN", "example.myshopify.com"),
            ("SHOPIFY_ACCESS_TOKEN", "shpat_test"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_lookup(lookup(&minimal())).unwrap();

        assert_eq!(config.ftp.port, DEFAULT_FTP_PORT);
        assert!(config.ftp.secure);
        assert_eq!(config.ftp.remote_path, DEFAULT_FTP_REMOTE_PATH);
        assert_eq!(config.shopify.api_version, "2024-07");
        assert_eq!(config.batch.create_batch_size, 200);
        assert_eq!(config.batch.quantity_batch_size, 150);
        assert_eq!(config.batch.pause(), Duration::from_secs(2));
        assert_eq!(config.poll.options().interval, Duration::from_secs(25));
        assert_eq!(config.poll.options().max_wait, None);
        assert_eq!(config.collection_mode, CollectionMode::Fetch);
        assert!(!config.reconcile.category_strict);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = SyncConfig::from_lookup(lookup(&[("SHOPIFY_STORE_DOMAIN", "example")]))
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
        assert!(err.to_string().contains("SHOPIFY_ACCESS_TOKEN"));
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("SYNC_CREATE_BATCH_SIZE", "lots"));
        let err = SyncConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("SYNC_CREATE_BATCH_SIZE"));
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let mut pairs = minimal();
        pairs.push(("SYNC_QUANTITY_BATCH_SIZE", "0"));
        assert!(SyncConfig::from_lookup(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_legacy_store_name_and_location() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("SHOPIFY_STORE_NAME", "my-store"),
            ("SHOPIFY_ACCESS_TOKEN", "shpat_test"),
            ("SHOPIFY_LOCATION_ID", "12345"),
            ("COLLECTION_MODE", "CREATE"),
            ("BULK_MAX_WAIT_SECS", "3600"),
        ]))
        .unwrap();

        assert_eq!(
            config.shopify.graphql_endpoint(),
            "https://my-store.myshopify.com/admin/api/2024-07/graphql.json"
        );
        assert_eq!(config.shopify.location_id, "gid://shopify/Location/12345");
        assert_eq!(config.collection_mode, CollectionMode::Create);
        assert_eq!(config.poll.options().max_wait, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_endpoint_accepts_full_url() {
        let shopify = ShopifyConfig {
            store_domain: "http://127.0.0.1:4040/".into(),
            api_version: "2024-07".into(),
            access_token: "t".into(),
            location_id: String::new(),
            http_timeout_secs: 5,
        };
        assert_eq!(
            shopify.graphql_endpoint(),
            "http://127.0.0.1:4040/admin/api/2024-07/graphql.json"
        );
    }

    #[test]
    fn test_run_validation_requires_ftp_host() {
        let config = SyncConfig::from_lookup(lookup(&minimal())).unwrap();
        let err = config.validate_for_run(false).unwrap_err();
        assert!(err.to_string().contains("FTP_HOST"));

        let err = config.validate_for_run(true).unwrap_err();
        assert!(err.to_string().contains("SHOPIFY_LOCATION_ID"));

        let mut pairs = minimal();
        pairs.push(("SHOPIFY_LOCATION_ID", "7"));
        let config = SyncConfig::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.validate_for_run(true).is_ok());
    }

    #[test]
    fn test_bool_parsing() {
        let mut pairs = minimal();
        pairs.push(("FTP_SECURE", "false"));
        pairs.push(("SYNC_CATEGORY_STRICT", "yes"));
        let config = SyncConfig::from_lookup(lookup(&pairs)).unwrap();
        assert!(!config.ftp.secure);
        assert!(config.reconcile.category_strict);

        let mut pairs = minimal();
        pairs.push(("FTP_SECURE", "maybe"));
        assert!(SyncConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
