//! GitHub release publisher
//!
//! Creates a release under a tag that does not exist yet and uploads a local
//! file as its single asset. Both calls run through [`with_retry`]; which
//! failures are worth another attempt is decided by
//! [`IsRetryable`](crate::retry::IsRetryable) on [`PublishError`].

mod tags;

pub use tags::{MAX_RANDOM_TRIES, SUFFIX_LEN, choose_release_tag, random_suffix};

use crate::config::{Config, ENV_GITHUB_TOKEN, RetryConfig};
use crate::error::{Error, PublishError, Result};
use crate::retry::with_retry;
use chrono::Local;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Page size used when listing releases
const RELEASES_PER_PAGE: usize = 100;

const USER_AGENT: &str = concat!("drive-to-release/", env!("CARGO_PKG_VERSION"));

/// A release as returned by the GitHub API
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Numeric release id, used for asset uploads
    pub id: u64,
    /// Tag the release points at
    pub tag_name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseTag {
    tag_name: String,
}

#[derive(Debug, Deserialize)]
struct UploadedAsset {
    browser_download_url: String,
}

#[derive(Debug, Serialize)]
struct NewRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: String,
    draft: bool,
    prerelease: bool,
}

/// Outcome of a full publish
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedAsset {
    /// Public download URL of the asset
    pub url: String,
    /// Tag of the release that holds it
    pub tag: String,
    /// Release id
    pub release_id: u64,
}

/// Client for the releases of one repository
pub struct ReleasePublisher {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    repository: String,
    release_api_timeout: Duration,
    upload_timeout: Duration,
    retry: RetryConfig,
    /// Tags created by this publisher, merged into every listing
    created_tags: Mutex<HashSet<String>>,
}

impl ReleasePublisher {
    /// Create a publisher for `config.github.repository`
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the token cannot be used as a header value,
    /// or an error if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.github.token))
            .map_err(|_| {
                Error::config("GitHub token contains invalid characters", ENV_GITHUB_TOKEN)
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.github.api_base.trim_end_matches('/').to_string(),
            upload_base: config.github.upload_base.trim_end_matches('/').to_string(),
            repository: config.github.repository.clone(),
            release_api_timeout: config.timeouts.release_api,
            upload_timeout: config.timeouts.upload,
            retry: config.retry.clone(),
            created_tags: Mutex::new(HashSet::new()),
        })
    }

    /// All release tags of the repository
    ///
    /// Follows pagination. A failed listing is logged and yields an empty set;
    /// tag selection then relies on the tags created during this run.
    pub async fn list_release_tags(&self) -> HashSet<String> {
        match self.fetch_release_tags().await {
            Ok(tags) => {
                debug!(count = tags.len(), "listed release tags");
                tags
            }
            Err(e) => {
                warn!(error = %e, "could not list releases, assuming none exist");
                HashSet::new()
            }
        }
    }

    async fn fetch_release_tags(&self) -> std::result::Result<HashSet<String>, reqwest::Error> {
        let url = format!("{}/repos/{}/releases", self.api_base, self.repository);
        let mut tags = HashSet::new();
        let mut page = 1usize;

        loop {
            let batch: Vec<ReleaseTag> = self
                .http
                .get(&url)
                .query(&[("per_page", RELEASES_PER_PAGE), ("page", page)])
                .timeout(self.release_api_timeout)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let last_page = batch.len() < RELEASES_PER_PAGE;
            tags.extend(batch.into_iter().map(|r| r.tag_name));
            if last_page {
                return Ok(tags);
            }
            page += 1;
        }
    }

    /// Create a release whose tag is `base_tag` or a unique variant of it
    ///
    /// Every attempt re-lists the existing tags before choosing one.
    ///
    /// # Errors
    /// The last [`PublishError`] once retries are exhausted, or the first
    /// non-retryable one.
    pub async fn create_release(
        &self,
        base_tag: &str,
    ) -> std::result::Result<Release, PublishError> {
        with_retry(&self.retry, "create release", || async move {
            self.try_create_release(base_tag).await
        })
        .await
    }

    async fn try_create_release(
        &self,
        base_tag: &str,
    ) -> std::result::Result<Release, PublishError> {
        let mut existing = self.list_release_tags().await;
        existing.extend(self.created_tags.lock().await.iter().cloned());

        let tag = choose_release_tag(base_tag, &existing, random_suffix, unix_now());
        if tag != base_tag {
            info!(base = base_tag, tag = %tag, "tag already exists, using a unique variant");
        }

        let payload = NewRelease {
            tag_name: &tag,
            name: &tag,
            body: format!(
                "Auto-uploaded video - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            draft: false,
            prerelease: false,
        };

        let response = self
            .http
            .post(format!("{}/repos/{}/releases", self.api_base, self.repository))
            .json(&payload)
            .timeout(self.release_api_timeout)
            .send()
            .await
            .map_err(|source| PublishError::Transport {
                operation: "create release",
                source,
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::CreateRejected {
                tag,
                status: status.as_u16(),
                body,
            });
        }

        let release: Release = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(format!("release payload: {}", e)))?;

        self.created_tags.lock().await.insert(release.tag_name.clone());
        info!(tag = %release.tag_name, id = release.id, "release created");
        Ok(release)
    }

    /// Upload `path` as an asset of `release`, returning its download URL
    ///
    /// The asset is named after the file. The body is streamed from disk.
    ///
    /// # Errors
    /// The last [`PublishError`] once retries are exhausted, or the first
    /// non-retryable one.
    pub async fn upload_asset(
        &self,
        release: &Release,
        path: &Path,
    ) -> std::result::Result<String, PublishError> {
        let asset_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PublishError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("'{}' has no usable file name", path.display()),
                ))
            })?;

        with_retry(&self.retry, "upload asset", || async move {
            self.try_upload_asset(release.id, asset_name, path).await
        })
        .await
    }

    async fn try_upload_asset(
        &self,
        release_id: u64,
        asset_name: &str,
        path: &Path,
    ) -> std::result::Result<String, PublishError> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        debug!(asset = asset_name, bytes = size, "uploading asset");

        let response = self
            .http
            .post(format!(
                "{}/repos/{}/releases/{}/assets",
                self.upload_base, self.repository, release_id
            ))
            .query(&[("name", asset_name)])
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|source| PublishError::Transport {
                operation: "upload asset",
                source,
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::UploadRejected {
                asset: asset_name.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let asset: UploadedAsset = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(format!("asset payload: {}", e)))?;

        info!(asset = asset_name, url = %asset.browser_download_url, "asset uploaded");
        Ok(asset.browser_download_url)
    }

    /// Create a release and upload `path` into it
    ///
    /// `pause` is slept between the two calls.
    ///
    /// # Errors
    /// The failing step's [`PublishError`].
    pub async fn publish(
        &self,
        base_tag: &str,
        path: &Path,
        pause: Duration,
    ) -> std::result::Result<PublishedAsset, PublishError> {
        let release = self.create_release(base_tag).await?;
        tokio::time::sleep(pause).await;
        let url = self.upload_asset(&release, path).await?;

        Ok(PublishedAsset {
            url,
            tag: release.tag_name,
            release_id: release.id,
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
