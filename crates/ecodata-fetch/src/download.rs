//! Archive download over HTTPS and FTP with retry logic
//!
//! HTTP downloads stream to disk through `reqwest`; FTP downloads run the
//! blocking `suppaftp` client on a worker thread. Both paths retry with
//! exponential backoff. A failed download surfaces as
//! [`EcodataError::Network`], which the pipeline treats as fatal only to the
//! source being fetched.

use ecodata_common::{EcodataError, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::net::ToSocketAddrs;
use std::path::Path;
use std::time::Duration;
use suppaftp::FtpStream;
use tracing::{debug, info, warn};
use url::Url;

/// Download behaviour configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Per-request timeout
    pub timeout: Duration,

    /// Maximum attempts per archive
    pub max_retries: u32,

    /// User agent sent with HTTP requests
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            // Large FTP archives on public mirrors can be slow
            timeout: Duration::from_secs(600),
            max_retries: 3,
            user_agent: format!("ecodata-fetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Archive downloader with retry logic
pub struct Downloader {
    client: reqwest::Client,
    config: DownloadConfig,
}

impl Downloader {
    /// Create a new downloader with the given configuration
    pub fn new(config: DownloadConfig) -> Result<Self> {
        if config.max_retries == 0 {
            return Err(EcodataError::Config("max_retries must be at least 1".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| EcodataError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Download a remote archive to a local file, retrying on failure
    ///
    /// Returns the number of bytes written. Re-fetching over an existing
    /// file simply overwrites it.
    pub async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut last_error = None;

        for attempt in 1..=self.config.max_retries {
            debug!(url, attempt, max = self.config.max_retries, "Download attempt");

            let result = if url.starts_with("ftp://") {
                self.fetch_ftp(url, dest).await
            } else {
                self.fetch_http(url, dest).await
            };

            match result {
                Ok(bytes) => {
                    info!(url, bytes, "Download complete");
                    return Ok(bytes);
                },
                Err(e) => {
                    warn!(
                        "Download attempt {}/{} failed: {}",
                        attempt, self.config.max_retries, e
                    );
                    last_error = Some(e);

                    if attempt < self.config.max_retries {
                        let backoff_secs = 2u64.pow(attempt);
                        debug!("Retrying in {} seconds...", backoff_secs);
                        tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    }
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            EcodataError::Network(format!(
                "Download of {} failed after {} attempts",
                url, self.config.max_retries
            ))
        }))
    }

    /// Stream an HTTP(S) URL to disk
    async fn fetch_http(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EcodataError::Network(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(EcodataError::Network(format!(
                "HTTP error for {}: {}",
                url,
                response.status()
            )));
        }

        let total_size = response.content_length().unwrap_or(0);
        let pb = progress_bar(total_size, dest);

        let mut file =
            std::fs::File::create(dest).map_err(|e| EcodataError::filesystem(dest, e))?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| EcodataError::Network(format!("Transfer from {} failed: {}", url, e)))?;
            file.write_all(&chunk)
                .map_err(|e| EcodataError::filesystem(dest, e))?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        pb.finish_and_clear();
        Ok(downloaded)
    }

    /// Download an ftp:// URL on a blocking worker thread
    async fn fetch_ftp(&self, url: &str, dest: &Path) -> Result<u64> {
        let url = url.to_string();
        let dest = dest.to_path_buf();
        let timeout = self.config.timeout;

        tokio::task::spawn_blocking(move || fetch_ftp_sync(&url, &dest, timeout))
            .await
            .map_err(|e| EcodataError::Network(format!("FTP download task panicked: {}", e)))?
    }
}

/// Synchronous FTP download implementation
fn fetch_ftp_sync(url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
    let parsed = Url::parse(url)
        .map_err(|e| EcodataError::Network(format!("Invalid FTP URL {}: {}", url, e)))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| EcodataError::Network(format!("FTP URL has no host: {}", url)))?;
    let port = parsed.port().unwrap_or(21);
    let path = parsed.path();

    debug!("Connecting to FTP server: {}:{}", host, port);

    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| EcodataError::Network(format!("Failed to resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| EcodataError::Network(format!("No address for host: {}", host)))?;

    let mut ftp_stream = FtpStream::connect_timeout(addr, timeout)
        .map_err(|e| EcodataError::Network(format!("Failed to connect to {}: {}", host, e)))?;

    // Extended Passive Mode - better for NAT/firewall environments
    ftp_stream.set_mode(suppaftp::Mode::ExtendedPassive);

    ftp_stream
        .login("anonymous", "user@example.com")
        .map_err(|e| EcodataError::Network(format!("FTP login to {} failed: {}", host, e)))?;

    ftp_stream
        .transfer_type(suppaftp::types::FileType::Binary)
        .map_err(|e| EcodataError::Network(format!("Failed to set binary mode: {}", e)))?;

    debug!("Downloading file: {}", path);
    let mut reader = ftp_stream
        .retr_as_buffer(path)
        .map_err(|e| EcodataError::Network(format!("Failed to retrieve {}: {}", path, e)))?;

    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| EcodataError::Network(format!("Failed to read FTP data: {}", e)))?;

    if let Err(e) = ftp_stream.quit() {
        warn!("Failed to quit FTP session gracefully: {}", e);
    }

    std::fs::write(dest, &data).map_err(|e| EcodataError::filesystem(dest, e))?;
    Ok(data.len() as u64)
}

/// Build the transfer progress bar used for HTTP downloads
fn progress_bar(total_size: u64, dest: &Path) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    pb.set_message(format!("Downloading {}", name));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_retries_rejected() {
        let config = DownloadConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(Downloader::new(config), Err(EcodataError::Config(_))));
    }

    #[test]
    fn test_default_config() {
        let config = DownloadConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("ecodata-fetch/"));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_network_error() {
        let downloader = Downloader::new(DownloadConfig {
            timeout: Duration::from_secs(1),
            max_retries: 1,
            ..Default::default()
        })
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("archive.zip");

        // Reserved TEST-NET-1 address, guaranteed unroutable
        let result = downloader
            .fetch("http://192.0.2.1:9/archive.zip", &dest)
            .await;
        assert!(matches!(result, Err(EcodataError::Network(_))));
    }
}
