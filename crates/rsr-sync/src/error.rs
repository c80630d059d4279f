//! Error types for the sync
//!
//! One enum covers the whole run. The variants mirror how the pipeline reacts
//! to a failure: transport problems on the primary feed or snapshot abort the
//! run, conflicts and bulk failures abort the current pass, and validation
//! failures are isolated to the record that caused them.

use thiserror::Error;

use crate::shopify::types::{BulkOperationStatus, UserError};

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error type for every stage of a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// FTP or HTTP connectivity failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The platform refused to issue a staged upload target
    #[error("Staged upload rejected: {}", format_user_errors(.0))]
    Staging(Vec<UserError>),

    /// Payload bytes could not be transferred to the staged target
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The platform rejected the shape of a query or mutation
    #[error("Validation failed{}: {message}", .field.as_deref().map(|f| format!(" on '{f}'")).unwrap_or_default())]
    Validation {
        field: Option<String>,
        message: String,
    },

    /// Another bulk operation of the same kind is already running remotely
    #[error("Bulk operation already in progress: {0}")]
    Conflict(String),

    /// A bulk operation reached a terminal state with nothing to download
    #[error("Bulk operation {id} ended {status:?}{}", .error_code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    BulkOperationFailed {
        id: String,
        status: BulkOperationStatus,
        error_code: Option<String>,
    },

    /// Streaming a result file to disk failed
    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// The platform throttled the request
    #[error("Rate limited by the platform{}", .0.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited(Option<u64>),

    /// The bulk operation did not finish within the configured wait
    #[error("Bulk operation {id} still running after {waited_secs}s")]
    PollTimeout { id: String, waited_secs: u64 },

    /// The caller cancelled the run
    #[error("Sync cancelled")]
    Cancelled,

    /// GraphQL-level errors (malformed query, missing data)
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or .env file.")]
    Config(String),

    /// The inventory feed could not be parsed
    #[error("Feed error: {0}")]
    Feed(String),

    /// The platform snapshot could not be read
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Local file operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Shared NDJSON/logging helper failed
    #[error(transparent)]
    Common(#[from] rsr_common::CommonError),
}

impl SyncError {
    /// Create a transport error
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error from a platform user error
    pub fn validation(error: &UserError) -> Self {
        Self::Validation {
            field: error.field_path(),
            message: error.message.clone(),
        }
    }

    /// Whether this failure should stop the whole run rather than one pass
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Cancelled)
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| match e.field_path() {
            Some(field) => format!("{field}: {}", e.message),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
