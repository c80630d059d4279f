//! RSR Sync Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Keeps a Shopify store's catalog and inventory in step with the RSR Group
//! distributor feed.
//!
//! # Overview
//!
//! - **Feed**: FTPS retrieval and parsing of the 78-column inventory file ([`feed`])
//! - **Catalog**: department to collection mapping and provisioning ([`catalog`])
//! - **Shopify**: GraphQL transport and the bulk operation lifecycle ([`shopify`])
//! - **Reconcile**: classification and payload generation ([`reconcile`])
//! - **Pipeline**: one end-to-end sync run ([`pipeline`])
//!
//! Configuration comes from the environment (and `.env`), see [`config`].

pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod shopify;

// Re-export commonly used types
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use pipeline::{SyncPipeline, SyncReport};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// RSR Group to Shopify inventory sync
#[derive(Parser, Debug)]
#[command(name = "rsr-sync")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full sync: feed, snapshot, product creation, quantity updates
    Run {
        /// Read the feed from a local file instead of the FTP server
        #[arg(long)]
        feed_file: Option<PathBuf>,
    },

    /// Fetch (or create, with COLLECTION_MODE=create) the department
    /// collections and write the category map
    Collections {
        /// Category map destination (defaults to SYNC_CATEGORY_MAP)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
