//! RSR Sync - Main entry point

use anyhow::Result;
use clap::Parser;
use rsr_common::logging::{init_logging, LogConfig, LogLevel};
use rsr_sync::catalog::CollectionProvisioner;
use rsr_sync::feed::{FeedFetcher, FeedSource, LocalFeed};
use rsr_sync::shopify::GraphqlClient;
use rsr_sync::{Cli, Commands, SyncConfig, SyncPipeline};
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("rsr-sync".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // The guard flushes the file writer on drop
    let _guard = match init_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e}");
            None
        },
    };

    if let Err(e) = execute_command(cli.command).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn execute_command(command: Commands) -> Result<()> {
    let config = SyncConfig::load()?;

    match command {
        Commands::Run { feed_file } => run_sync(config, feed_file).await,
        Commands::Collections { output } => provision_collections(config, output).await,
    }
}

async fn run_sync(config: SyncConfig, feed_file: Option<PathBuf>) -> Result<()> {
    config.validate_for_run(feed_file.is_some())?;

    let feed_source: Box<dyn FeedSource> = match feed_file {
        Some(path) => Box::new(LocalFeed::new(path)),
        None => Box::new(FeedFetcher::new(config.ftp.clone())),
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            signal_token.cancel();
        }
    });

    let pipeline = SyncPipeline::new(config, feed_source, cancel)?;
    let report = pipeline.run().await?;

    info!(
        new = report.new_records,
        changed = report.changed_records,
        unchanged = report.unchanged_records,
        created = report.products_created,
        product_failures = report.product_failures,
        quantities = report.quantities_submitted,
        "Sync finished"
    );
    for pass_error in &report.pass_errors {
        warn!(pass = pass_error.pass, batch = pass_error.batch, "Pass ended early: {}", pass_error.error);
    }
    Ok(())
}

async fn provision_collections(config: SyncConfig, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| config.reconcile.category_map_path.clone());
    let client = GraphqlClient::new(&config.shopify)?;

    let summary = CollectionProvisioner::new(&client, config.collection_mode)
        .provision_to_file(&path)
        .await?;

    if !summary.missing.is_empty() {
        warn!(
            missing = summary.missing.len(),
            handles = %summary.missing.join(", "),
            "Some department collections are unavailable; their products will be uncategorized"
        );
    }
    Ok(())
}
