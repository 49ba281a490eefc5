//! Google Drive source fetcher
//!
//! [`DriveClient`] resolves a display name for a file and downloads it to a
//! local path. Downloads try the primary [`LargeFileDownloader`] under the
//! shared retry policy, then the export-endpoint fallback once. An access
//! denial from the primary skips both the remaining attempts and the fallback.

mod confirm;
mod fallback;
mod stream;

pub use confirm::{ConfirmingDownloader, LargeFileDownloader};

use crate::config::{Config, RetryConfig};
use crate::error::{Error, FetchError, Result};
use crate::links::FileId;
use crate::retry::with_retry;
use crate::types::{DownloadMethod, Event};
use crate::utils::{format_mib, remove_file_best_effort};
use fallback::ExportFallback;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// User agent sent with every Drive request
const USER_AGENT: &str = concat!("drive-to-release/", env!("CARGO_PKG_VERSION"));

/// Result of a successful download
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    /// Where the file was written
    pub path: PathBuf,
    /// File size in bytes (never zero)
    pub bytes: u64,
    /// Strategy that produced the file
    pub method: DownloadMethod,
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    name: Option<String>,
}

/// Name used when Drive does not tell us one
///
/// # Examples
///
/// ```
/// use drive_to_release::drive::synthesized_name;
/// use drive_to_release::links::FileId;
///
/// assert_eq!(synthesized_name(&FileId::new("1AbCdEfGhIjK")), "video_1AbCdEfG.mp4");
/// ```
#[must_use]
pub fn synthesized_name(file_id: &FileId) -> String {
    format!("video_{}.mp4", file_id.prefix(8))
}

/// Client for Drive metadata lookups and downloads
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    metadata_timeout: Duration,
    retry: RetryConfig,
    primary: Arc<dyn LargeFileDownloader>,
    fallback: ExportFallback,
    events: broadcast::Sender<Event>,
}

impl DriveClient {
    /// Create a client with the default confirmation-aware primary downloader
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &Config, events: broadcast::Sender<Event>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let primary: Arc<dyn LargeFileDownloader> = Arc::new(ConfirmingDownloader::new(
            http.clone(),
            config.drive.download_base.clone(),
            config.timeouts.download,
            events.clone(),
        ));
        let fallback = ExportFallback::new(
            http.clone(),
            config.drive.download_base.clone(),
            config.timeouts.download,
            events.clone(),
        );

        Ok(Self {
            http,
            api_base: config.drive.api_base.clone(),
            api_key: config.drive.api_key.clone(),
            metadata_timeout: config.timeouts.metadata,
            retry: config.retry.clone(),
            primary,
            fallback,
            events,
        })
    }

    /// Replace the primary downloader
    #[must_use]
    pub fn with_primary(mut self, primary: Arc<dyn LargeFileDownloader>) -> Self {
        self.primary = primary;
        self
    }

    /// Look up the file's display name
    ///
    /// Never fails: any error, timeout or missing name yields
    /// [`synthesized_name`].
    pub async fn resolve_name(&self, file_id: &FileId) -> String {
        match self.fetch_metadata(file_id).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => {
                debug!(file_id = %file_id, "metadata has no name");
                synthesized_name(file_id)
            }
            Err(e) => {
                debug!(file_id = %file_id, error = %e, "metadata lookup failed");
                synthesized_name(file_id)
            }
        }
    }

    async fn fetch_metadata(
        &self,
        file_id: &FileId,
    ) -> std::result::Result<Option<String>, reqwest::Error> {
        let url = format!(
            "{}/drive/v3/files/{}",
            self.api_base.trim_end_matches('/'),
            file_id
        );
        let mut request = self
            .http
            .get(url)
            .query(&[("fields", "name,size")])
            .timeout(self.metadata_timeout);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key.as_str())]);
        }

        let metadata: FileMetadata = request.send().await?.error_for_status()?.json().await?;
        Ok(metadata.name)
    }

    /// Download `file_id` to `dest`
    ///
    /// Runs the primary downloader under the retry policy, then, unless the
    /// primary reported an access denial, waits one retry delay and tries the
    /// fallback once. A produced file that is missing or empty counts as a
    /// failed attempt; partial files are removed on every failure.
    ///
    /// # Errors
    /// The fallback's error, or the primary's access denial.
    pub async fn download(
        &self,
        file_id: &FileId,
        dest: &Path,
    ) -> std::result::Result<Download, FetchError> {
        let primary = with_retry(&self.retry, "drive download", || async move {
            let result = self.primary.download(file_id, dest).await;
            self.check_output(dest, result).await
        })
        .await;

        let primary_error = match primary {
            Ok(bytes) => {
                info!(file_id = %file_id, size = %format_mib(bytes), "downloaded");
                return Ok(Download {
                    path: dest.to_path_buf(),
                    bytes,
                    method: DownloadMethod::Primary,
                });
            }
            Err(e @ FetchError::AccessDenied { .. }) => {
                warn!(file_id = %file_id, error = %e, "file is not publicly accessible");
                return Err(e);
            }
            Err(e) => e,
        };

        warn!(
            file_id = %file_id,
            error = %primary_error,
            "primary download failed, trying export fallback"
        );
        tokio::time::sleep(self.retry.delay).await;
        self.events
            .send(Event::FallbackStarted {
                file_id: file_id.to_string(),
            })
            .ok();

        let result = self.fallback.download(file_id, dest).await;
        let bytes = self.check_output(dest, result).await?;
        info!(file_id = %file_id, size = %format_mib(bytes), "downloaded with fallback");
        Ok(Download {
            path: dest.to_path_buf(),
            bytes,
            method: DownloadMethod::Fallback,
        })
    }

    /// Turn a strategy's result into a verified size, cleaning up on failure
    async fn check_output(
        &self,
        dest: &Path,
        result: std::result::Result<u64, FetchError>,
    ) -> std::result::Result<u64, FetchError> {
        if let Err(e) = result {
            remove_file_best_effort(dest);
            return Err(e);
        }

        let metadata = match tokio::fs::metadata(dest).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::MissingFile {
                    path: dest.to_path_buf(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.len() == 0 {
            remove_file_best_effort(dest);
            return Err(FetchError::EmptyFile {
                path: dest.to_path_buf(),
            });
        }

        Ok(metadata.len())
    }
}
