//! Export-endpoint fallback downloader
//!
//! Used once the primary strategy has spent its attempts. It talks to the
//! plain `uc?export=download` endpoint and looks for a confirm token first in
//! a `download_warning*` cookie, then in the first 100 KB of an HTML body.

use super::confirm::{access_denied_reason, check_status};
use super::stream::{is_html, read_prefix, save_body, send};
use crate::error::FetchError;
use crate::links::FileId;
use crate::types::Event;
use regex::bytes::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// How much of an HTML body is searched for a confirm token
pub(crate) const TOKEN_SCAN_LIMIT: usize = 100_000;

const WARNING_COOKIE_PREFIX: &str = "download_warning";

static CONFIRM_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| match Regex::new(r#"confirm=([^&"']+)"#) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(error = %e, "invalid confirm token pattern");
            None
        }
    });

/// Find a confirm token in raw page bytes
pub(crate) fn scan_confirm_token(head: &[u8]) -> Option<String> {
    let token = (*CONFIRM_TOKEN).as_ref()?.captures(head)?.get(1)?.as_bytes();
    Some(String::from_utf8_lossy(token).into_owned())
}

fn cookie_token(response: &reqwest::Response) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name().starts_with(WARNING_COOKIE_PREFIX))
        .map(|c| c.value().to_string())
}

/// Second-chance downloader for the export endpoint
pub(crate) struct ExportFallback {
    http: reqwest::Client,
    download_base: String,
    timeout: Duration,
    events: broadcast::Sender<Event>,
}

impl ExportFallback {
    pub(crate) fn new(
        http: reqwest::Client,
        download_base: impl Into<String>,
        timeout: Duration,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            http,
            download_base: download_base.into(),
            timeout,
            events,
        }
    }

    fn request(&self, file_id: &FileId, confirm: Option<&str>) -> reqwest::RequestBuilder {
        let url = format!("{}/uc", self.download_base.trim_end_matches('/'));
        let request = self
            .http
            .get(url)
            .query(&[("export", "download"), ("id", file_id.as_str())]);
        match confirm {
            Some(token) => request.query(&[("confirm", token)]),
            None => request,
        }
    }

    async fn fetch(
        &self,
        file_id: &FileId,
        confirm: Option<&str>,
    ) -> Result<reqwest::Response, FetchError> {
        let response = send(self.request(file_id, confirm), self.timeout).await?;
        check_status(file_id, response)
    }

    /// Download `file_id` into `dest`, returning the number of bytes written
    pub(crate) async fn download(&self, file_id: &FileId, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.fetch(file_id, None).await?;

        if let Some(token) = cookie_token(&response) {
            debug!(file_id = %file_id, "confirm token found in cookie");
            response = self.fetch(file_id, Some(&token)).await?;
        }

        if is_html(&response) {
            let head = read_prefix(response, TOKEN_SCAN_LIMIT, self.timeout).await?;

            if let Some(marker) = access_denied_reason(&String::from_utf8_lossy(&head)) {
                return Err(FetchError::AccessDenied {
                    file_id: file_id.to_string(),
                    reason: format!("Drive page says \"{marker}\""),
                });
            }

            let token = scan_confirm_token(&head).ok_or_else(|| {
                FetchError::ConfirmationNotFound {
                    file_id: file_id.to_string(),
                }
            })?;
            debug!(file_id = %file_id, "confirm token found in page body");

            response = self.fetch(file_id, Some(&token)).await?;
            if is_html(&response) {
                return Err(FetchError::ConfirmationNotFound {
                    file_id: file_id.to_string(),
                });
            }
        }

        save_body(response, dest, self.timeout, &self.events).await
    }
}
