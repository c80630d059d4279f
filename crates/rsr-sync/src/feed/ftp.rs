//! Feed retrieval
//!
//! The distributor publishes its inventory file on an FTP server that requires
//! explicit TLS (`AUTH TLS`). suppaftp is blocking, so each transfer runs on
//! the blocking thread pool. There is a single attempt per run; a failed fetch
//! aborts the sync.

use crate::config::FtpConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use suppaftp::native_tls::TlsConnector;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, info, warn};

/// Where the feed comes from
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Write the current feed to `destination` and return its size in bytes
    async fn fetch(&self, destination: &Path) -> Result<u64>;

    /// Human readable origin, for logs and the run report
    fn describe(&self) -> String;
}

/// Downloads the feed over FTP/FTPS
pub struct FeedFetcher {
    config: FtpConfig,
}

impl FeedFetcher {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    fn download_sync(config: &FtpConfig, destination: &Path) -> Result<u64> {
        let address = format!("{}:{}", config.host, config.port);
        debug!(address = %address, secure = config.secure, "Connecting to feed server");

        let mut ftp = NativeTlsFtpStream::connect(&address)
            .map_err(|e| SyncError::transport(format!("FTP connect to {address} failed: {e}")))?;

        if config.secure {
            let connector = TlsConnector::new()
                .map_err(|e| SyncError::transport(format!("TLS setup failed: {e}")))?;
            ftp = ftp
                .into_secure(NativeTlsConnector::from(connector), &config.host)
                .map_err(|e| SyncError::transport(format!("FTP TLS upgrade failed: {e}")))?;
        }

        ftp.set_mode(suppaftp::Mode::Passive);

        ftp.login(&config.username, &config.password)
            .map_err(|e| SyncError::transport(format!("FTP login failed: {e}")))?;

        ftp.transfer_type(suppaftp::types::FileType::Binary)
            .map_err(|e| SyncError::transport(format!("Failed to set binary mode: {e}")))?;

        debug!(path = %config.remote_path, "Downloading feed");
        let buffer = ftp
            .retr_as_buffer(&config.remote_path)
            .map_err(|e| {
                SyncError::transport(format!("Failed to download {}: {e}", config.remote_path))
            })?
            .into_inner();

        if let Err(e) = ftp.quit() {
            warn!("Failed to quit FTP session gracefully: {}", e);
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, &buffer)?;

        Ok(buffer.len() as u64)
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, destination: &Path) -> Result<u64> {
        let config = self.config.clone();
        let destination = destination.to_path_buf();

        let bytes = tokio::task::spawn_blocking({
            let destination = destination.clone();
            move || Self::download_sync(&config, &destination)
        })
        .await
        .map_err(|e| SyncError::transport(format!("FTP download task panicked: {e}")))??;

        info!(
            remote = %self.config.remote_path,
            local = %destination.display(),
            bytes,
            "Downloaded inventory feed"
        );
        Ok(bytes)
    }

    fn describe(&self) -> String {
        format!(
            "ftp{}://{}:{}{}",
            if self.config.secure { "es" } else { "" },
            self.config.host,
            self.config.port,
            self.config.remote_path
        )
    }
}

/// Uses a feed file that is already on disk
pub struct LocalFeed {
    path: PathBuf,
}

impl LocalFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for LocalFeed {
    async fn fetch(&self, destination: &Path) -> Result<u64> {
        if self.path == destination {
            return Ok(tokio::fs::metadata(destination).await?.len());
        }
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = tokio::fs::copy(&self.path, destination)
            .await
            .map_err(|e| SyncError::Feed(format!("Cannot read {}: {e}", self.path.display())))?;
        info!(source = %self.path.display(), bytes, "Using local inventory feed");
        Ok(bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ftp_config() -> FtpConfig {
        FtpConfig {
            host: "ftps.example.com".into(),
            port: 2222,
            username: "dealer".into(),
            password: "secret".into(),
            secure: true,
            remote_path: "/ftpdownloads/fulfillment-inv-new.txt".into(),
        }
    }

    #[test]
    fn test_describe_ftp() {
        let fetcher = FeedFetcher::new(ftp_config());
        assert_eq!(
            fetcher.describe(),
            "ftpes://ftps.example.com:2222/ftpdownloads/fulfillment-inv-new.txt"
        );
    }

    #[tokio::test]
    async fn test_local_feed_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("export.txt");
        std::fs::write(&source, "A1;;Widget\n").unwrap();

        let destination = dir.path().join("work/rsr-inventory.txt");
        let bytes = LocalFeed::new(&source).fetch(&destination).await.unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(std::fs::read_to_string(destination).unwrap(), "A1;;Widget\n");
    }

    #[tokio::test]
    async fn test_local_feed_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFeed::new(dir.path().join("missing.txt"))
            .fetch(&dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Feed(_)));
    }
}
