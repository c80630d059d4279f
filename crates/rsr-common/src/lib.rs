//! RSR Sync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the RSR → Shopify sync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and the crate [`Result`] alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` environment variables
//! - **NDJSON**: newline-delimited JSON readers and writers used for every
//!   payload, snapshot and audit artifact the sync writes to disk
//!
//! # Example
//!
//! ```no_run
//! use rsr_common::jsonl;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Line {
//!     sku: String,
//! }
//!
//! fn roundtrip() -> rsr_common::Result<()> {
//!     jsonl::write_lines("./data/lines.jsonl", [Line { sku: "A1".into() }])?;
//!     let lines: Vec<Line> = jsonl::read_lines("./data/lines.jsonl")?;
//!     assert_eq!(lines.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod jsonl;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
