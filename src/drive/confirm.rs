//! Confirmation-aware primary downloader
//!
//! Large or unscanned Drive files are not served directly: the first request
//! returns an HTML interstitial with a download form (or, on older pages, a
//! link carrying a `confirm=` token). The downloader recognises these pages,
//! replays the confirmed request and streams the real body to disk.

use super::stream::{is_html, read_text, save_body, send};
use crate::error::FetchError;
use crate::links::FileId;
use crate::types::Event;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Seam for the primary download strategy
///
/// The default implementation is [`ConfirmingDownloader`]. Tests and embedders
/// can substitute their own.
#[async_trait]
pub trait LargeFileDownloader: Send + Sync {
    /// Download `file_id` into `dest`, returning the number of bytes written
    ///
    /// # Errors
    /// [`FetchError::AccessDenied`] when the file is not publicly readable;
    /// any other variant for failures that may be transient.
    async fn download(&self, file_id: &FileId, dest: &Path) -> Result<u64, FetchError>;
}

/// How much of an interstitial page is read before giving up on it
pub(crate) const PAGE_READ_LIMIT: usize = 256 * 1024;

/// Page texts that mean the file is not shared publicly
const ACCESS_DENIED_MARKERS: &[&str] = &[
    "you need access",
    "you need permission",
    "access denied",
    "request access",
];

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(pattern, error = %e, "invalid confirmation page pattern");
            None
        }
    }
}

static DOWNLOAD_FORM: LazyLock<Option<Regex>> = LazyLock::new(|| {
    compile(r#"(?is)(<form\b[^>]*\bid\s*=\s*["']download-form["'][^>]*>)(.*?)</form>"#)
});
static ACTION_ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#"(?i)\baction\s*=\s*["']([^"']+)["']"#));
static INPUT_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| compile(r"(?i)<input\b[^>]*>"));
static HIDDEN_TYPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#"(?i)\btype\s*=\s*["']hidden["']"#));
static NAME_ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#"(?i)\bname\s*=\s*["']([^"']*)["']"#));
static VALUE_ATTR: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#"(?i)\bvalue\s*=\s*["']([^"']*)["']"#));
static CONFIRM_LINK: LazyLock<Option<Regex>> =
    LazyLock::new(|| compile(r#"(?i)href\s*=\s*["']([^"']*confirm=[^"']*)["']"#));

/// How to get past an interstitial page
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Confirmation {
    /// Submit the download form with its hidden fields
    Form {
        /// Absolute form action
        action: String,
        /// Hidden input name/value pairs
        params: Vec<(String, String)>,
    },
    /// Follow a link that already carries the confirm token
    Link(String),
}

/// Returns the matched marker when the page is a permission wall
pub(crate) fn access_denied_reason(page: &str) -> Option<&'static str> {
    let lower = page.to_ascii_lowercase();
    ACCESS_DENIED_MARKERS
        .iter()
        .copied()
        .find(|marker| lower.contains(marker))
}

/// Find the way past an interstitial page, preferring the download form
pub(crate) fn find_confirmation(page: &str, base: &str) -> Option<Confirmation> {
    parse_download_form(page, base).or_else(|| {
        let href = (*CONFIRM_LINK).as_ref()?.captures(page)?.get(1)?.as_str();
        Some(Confirmation::Link(resolve(&unescape_html(href), base)))
    })
}

fn parse_download_form(page: &str, base: &str) -> Option<Confirmation> {
    let form = (*DOWNLOAD_FORM).as_ref()?.captures(page)?;
    let tag = form.get(1)?.as_str();
    let body = form.get(2)?.as_str();
    let action = (*ACTION_ATTR).as_ref()?.captures(tag)?.get(1)?.as_str();

    let hidden = (*HIDDEN_TYPE).as_ref()?;
    let name_attr = (*NAME_ATTR).as_ref()?;
    let value_attr = (*VALUE_ATTR).as_ref()?;

    let params = (*INPUT_TAG)
        .as_ref()?
        .find_iter(body)
        .map(|m| m.as_str())
        .filter(|input| hidden.is_match(input))
        .filter_map(|input| {
            let name = name_attr.captures(input)?.get(1)?.as_str();
            let value = value_attr
                .captures(input)
                .and_then(|c| c.get(1))
                .map_or("", |v| v.as_str());
            Some((unescape_html(name), unescape_html(value)))
        })
        .collect();

    Some(Confirmation::Form {
        action: resolve(&unescape_html(action), base),
        params,
    })
}

fn resolve(target: &str, base: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else if target.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), target)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), target)
    }
}

fn unescape_html(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Map 401/403 to a final denial and other non-success statuses to a retryable error
pub(crate) fn check_status(
    file_id: &FileId,
    response: reqwest::Response,
) -> Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(FetchError::AccessDenied {
            file_id: file_id.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            file_id: file_id.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Primary downloader that understands Drive's confirmation pages
pub struct ConfirmingDownloader {
    http: reqwest::Client,
    download_base: String,
    timeout: Duration,
    events: broadcast::Sender<Event>,
}

impl ConfirmingDownloader {
    /// Create a downloader
    ///
    /// # Arguments
    /// * `http` - Client with a cookie store, shared with the fallback
    /// * `download_base` - Download host, e.g. `https://drive.google.com`
    /// * `timeout` - Applied to the response headers and to every body read
    /// * `events` - Receives throttled progress events
    pub fn new(
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

    async fn read_page(
        &self,
        file_id: &FileId,
        response: reqwest::Response,
    ) -> Result<String, FetchError> {
        let page = read_text(response, PAGE_READ_LIMIT, self.timeout).await?;
        if let Some(marker) = access_denied_reason(&page) {
            return Err(FetchError::AccessDenied {
                file_id: file_id.to_string(),
                reason: format!("Drive page says \"{marker}\""),
            });
        }
        Ok(page)
    }
}

#[async_trait]
impl LargeFileDownloader for ConfirmingDownloader {
    async fn download(&self, file_id: &FileId, dest: &Path) -> Result<u64, FetchError> {
        let url = format!("{}/uc", self.download_base.trim_end_matches('/'));
        let request = self
            .http
            .get(&url)
            .query(&[("export", "download"), ("id", file_id.as_str())]);
        let response = check_status(file_id, send(request, self.timeout).await?)?;

        if !is_html(&response) {
            return save_body(response, dest, self.timeout, &self.events).await;
        }

        let page = self.read_page(file_id, response).await?;
        let confirmation = find_confirmation(&page, &self.download_base).ok_or_else(|| {
            FetchError::ConfirmationNotFound {
                file_id: file_id.to_string(),
            }
        })?;
        debug!(file_id = %file_id, ?confirmation, "replaying confirmed download request");

        let request = match confirmation {
            Confirmation::Form { action, params } => self.http.get(action).query(&params),
            Confirmation::Link(link) => self.http.get(link),
        };
        let response = check_status(file_id, send(request, self.timeout).await?)?;

        if is_html(&response) {
            // Still a page after confirming: either a permission wall or a format we do not know
            self.read_page(file_id, response).await?;
            return Err(FetchError::ConfirmationNotFound {
                file_id: file_id.to_string(),
            });
        }

        save_body(response, dest, self.timeout, &self.events).await
    }
}
