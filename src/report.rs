//! Failure records and the human-readable failure report
//!
//! Every migratable entry that does not end with a published URL leaves
//! exactly one [`FailureRecord`]. The report lists them in the order they
//! happened and closes with a count per reason.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEAVY_RULE: &str = "================================================================================";
const LIGHT_RULE: &str = "────────────────────────────────────────────────────────────────────────────────";

/// Why an entry failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No Drive file id could be extracted
    InvalidUrl,
    /// Both download strategies failed
    DownloadFailed,
    /// The release could not be created
    ReleaseCreationFailed,
    /// The asset could not be uploaded
    UploadFailed,
}

impl FailureReason {
    /// Text used in the report and console
    pub fn description(&self) -> &'static str {
        match self {
            FailureReason::InvalidUrl => "Invalid Drive URL - Could not extract file ID",
            FailureReason::DownloadFailed => {
                "Download Failed - Check if file is publicly accessible"
            }
            FailureReason::ReleaseCreationFailed => "GitHub Release Creation Failed",
            FailureReason::UploadFailed => {
                "GitHub Upload Failed - File downloaded but upload error"
            }
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// One failed entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The Drive link as it appeared in the input
    pub source_url: String,
    /// Failure category
    pub reason: FailureReason,
    /// Local file name, when it was resolved
    pub filename: Option<String>,
    /// Release tag, when a release existed
    pub release_tag: Option<String>,
    /// Last underlying error message
    pub detail: Option<String>,
    /// When the failure was recorded
    pub timestamp: DateTime<Local>,
}

impl FailureRecord {
    /// Record a failure now
    pub fn new(source_url: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            source_url: source_url.into(),
            reason,
            filename: None,
            release_tag: None,
            detail: None,
            timestamp: Local::now(),
        }
    }

    /// Attach the local file name
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Attach the release tag
    #[must_use]
    pub fn with_release_tag(mut self, tag: impl Into<String>) -> Self {
        self.release_tag = Some(tag.into());
        self
    }

    /// Attach the underlying error message
    #[must_use]
    pub fn with_detail(mut self, detail: impl std::fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}

/// Count failures per reason, in order of first appearance
pub fn count_by_reason(records: &[FailureRecord]) -> Vec<(FailureReason, usize)> {
    let mut counts: Vec<(FailureReason, usize)> = Vec::new();
    for record in records {
        match counts.iter_mut().find(|(reason, _)| *reason == record.reason) {
            Some((_, count)) => *count += 1,
            None => counts.push((record.reason, 1)),
        }
    }
    counts
}

/// Render the failure report
pub fn render(records: &[FailureRecord], generated_at: DateTime<Local>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{HEAVY_RULE}");
    let _ = writeln!(out, "FAILED DRIVE LINKS - Retry These Links");
    let _ = writeln!(out, "Generated: {}", generated_at.format(TIMESTAMP_FORMAT));
    let _ = writeln!(out, "{HEAVY_RULE}");
    let _ = writeln!(out);

    for (idx, record) in records.iter().enumerate() {
        let _ = writeln!(out, "\n{LIGHT_RULE}");
        let _ = writeln!(out, "Failed Link #{}", idx + 1);
        let _ = writeln!(out, "{LIGHT_RULE}");
        let _ = writeln!(out, "Drive URL: {}", record.source_url);
        let _ = writeln!(out, "Reason: {}", record.reason);
        if let Some(filename) = &record.filename {
            let _ = writeln!(out, "Filename: {filename}");
        }
        if let Some(tag) = &record.release_tag {
            let _ = writeln!(out, "Release Tag: {tag}");
        }
        if let Some(detail) = &record.detail {
            let _ = writeln!(out, "Detail: {detail}");
        }
        let _ = writeln!(
            out,
            "Timestamp: {}",
            record.timestamp.format(TIMESTAMP_FORMAT)
        );
        let _ = writeln!(out, "\n{LIGHT_RULE}");
    }

    let _ = writeln!(out, "\n{HEAVY_RULE}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{HEAVY_RULE}");
    let _ = writeln!(out, "Total Failed Links: {}", records.len());
    let _ = writeln!(out, "\nFailure Breakdown:");
    for (reason, count) in count_by_reason(records) {
        let _ = writeln!(out, "  • {reason}: {count}");
    }
    let _ = writeln!(out, "\n{HEAVY_RULE}");
    let _ = writeln!(
        out,
        "\nTO RETRY: Copy the Drive URLs above and add them back to the link file"
    );
    let _ = writeln!(out, "{HEAVY_RULE}");

    out
}

/// Write the report if there is anything to report
///
/// Returns `Ok(false)` without touching the file system when `records` is empty.
pub async fn write_report(path: &Path, records: &[FailureRecord]) -> std::io::Result<bool> {
    if records.is_empty() {
        return Ok(false);
    }

    let content = render(records, Local::now());
    crate::utils::write_atomic(path, content.as_bytes()).await?;
    tracing::info!(path = %path.display(), failures = records.len(), "failure report written");
    Ok(true)
}
