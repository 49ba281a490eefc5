//! Link classification and Drive file id extraction
//!
//! Each line of the link list is sorted into one of four kinds before any
//! network work happens. Target-host markers are checked before the Drive
//! marker, so feeding a rewritten list back in never re-migrates anything.

use regex::Regex;
use std::sync::LazyLock;

/// Substring identifying links on the source storage system
pub const SOURCE_MARKER: &str = "drive.google.com";

/// Substrings identifying links already on the target hosting system
pub const TARGET_MARKERS: &[&str] = &["github.com", "githubusercontent.com"];

/// What a single line of the link list turned out to be
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// Blank line or `#` comment
    Skip,
    /// Already points at GitHub; kept verbatim
    AlreadyMigrated,
    /// Neither Drive nor GitHub; dropped
    Foreign,
    /// A Drive link that should be migrated
    Migratable,
}

/// A classified, trimmed line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkEntry {
    /// 1-based line number in the input file
    pub line_number: usize,
    /// Trimmed line content
    pub url: String,
    /// Classification result
    pub kind: LinkKind,
}

/// Drive file identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileId(String);

impl FileId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, used for synthesized names
    pub fn prefix(&self, n: usize) -> &str {
        match self.0.char_indices().nth(n) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One URL shape that can carry a Drive file id
struct IdRule {
    name: &'static str,
    pattern: Regex,
}

/// Ordered id rules; the first match wins
static ID_RULES: LazyLock<Vec<IdRule>> = LazyLock::new(|| {
    [
        ("file path", r"/file/d/([a-zA-Z0-9_-]+)"),
        ("id query", r"id=([a-zA-Z0-9_-]+)"),
        ("short path", r"/d/([a-zA-Z0-9_-]+)"),
        ("download query", r"download\?id=([a-zA-Z0-9_-]+)"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| match Regex::new(pattern) {
        Ok(pattern) => Some(IdRule { name, pattern }),
        Err(e) => {
            tracing::error!(rule = name, error = %e, "invalid link rule");
            None
        }
    })
    .collect()
});

/// Classify a single raw line
///
/// # Examples
///
/// ```
/// use drive_to_release::links::{classify, LinkKind};
///
/// assert_eq!(classify("   "), LinkKind::Skip);
/// assert_eq!(classify("# old batch"), LinkKind::Skip);
/// assert_eq!(classify("https://github.com/o/r/releases/download/t/a.mp4"), LinkKind::AlreadyMigrated);
/// assert_eq!(classify("https://drive.google.com/file/d/ABC/view"), LinkKind::Migratable);
/// assert_eq!(classify("https://example.com/video.mp4"), LinkKind::Foreign);
/// ```
#[must_use]
pub fn classify(line: &str) -> LinkKind {
    let line = line.trim();

    if line.is_empty() || line.starts_with('#') {
        return LinkKind::Skip;
    }

    if TARGET_MARKERS.iter().any(|marker| line.contains(marker)) {
        return LinkKind::AlreadyMigrated;
    }

    if line.contains(SOURCE_MARKER) {
        return LinkKind::Migratable;
    }

    LinkKind::Foreign
}

/// Classify every line of a link list, keeping line numbers
pub fn classify_lines<'a, I>(lines: I) -> Vec<LinkEntry>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let url = raw.trim().to_string();
            let kind = classify(&url);
            LinkEntry {
                line_number: idx + 1,
                url,
                kind,
            }
        })
        .collect()
}

/// Extract the Drive file id from a link
///
/// Returns `None` when no rule matches.
///
/// # Examples
///
/// ```
/// use drive_to_release::links::extract_file_id;
///
/// let id = extract_file_id("https://drive.google.com/file/d/ABC123/view").unwrap();
/// assert_eq!(id.as_str(), "ABC123");
/// assert!(extract_file_id("https://drive.google.com/drive/my-drive").is_none());
/// ```
#[must_use]
pub fn extract_file_id(url: &str) -> Option<FileId> {
    ID_RULES.iter().find_map(|rule| {
        let id = rule.pattern.captures(url)?.get(1)?.as_str();
        tracing::trace!(rule = rule.name, id, "matched file id");
        Some(FileId::new(id))
    })
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(classify(""), LinkKind::Skip);
        assert_eq!(classify("   \t "), LinkKind::Skip);
        assert_eq!(classify("# https://drive.google.com/file/d/ABC/view"), LinkKind::Skip);
        assert_eq!(classify("   # indented comment"), LinkKind::Skip);
    }

    #[test]
    fn github_links_are_already_migrated() {
        assert_eq!(
            classify("https://github.com/octo/videos/releases/download/video-a/a.mp4"),
            LinkKind::AlreadyMigrated
        );
        assert_eq!(
            classify("https://objects.githubusercontent.com/github-production-release-asset/1"),
            LinkKind::AlreadyMigrated
        );
    }

    #[test]
    fn target_marker_wins_over_source_marker() {
        // A GitHub URL that happens to mention Drive in its query must not be re-migrated
        assert_eq!(
            classify("https://github.com/o/r?from=drive.google.com"),
            LinkKind::AlreadyMigrated
        );
    }

    #[test]
    fn drive_links_are_migratable() {
        assert_eq!(
            classify("  https://drive.google.com/open?id=XYZ  "),
            LinkKind::Migratable
        );
    }

    #[test]
    fn other_links_are_foreign() {
        assert_eq!(classify("https://vimeo.com/123"), LinkKind::Foreign);
        assert_eq!(classify("not even a url"), LinkKind::Foreign);
    }

    #[test]
    fn classification_is_idempotent_on_published_urls() {
        let published = "https://github.com/octo/videos/releases/download/video-clip/clip.mp4";
        assert_eq!(classify(published), LinkKind::AlreadyMigrated);
        assert_eq!(classify(&format!("{published}\n")), LinkKind::AlreadyMigrated);
    }

    #[test]
    fn classify_lines_numbers_from_one_and_trims() {
        let entries = classify_lines(["", "  https://drive.google.com/file/d/A/view  ", "#x"]);

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].line_number, 1);
        assert_eq!(entries[0].kind, LinkKind::Skip);
        assert_eq!(entries[1].line_number, 2);
        assert_eq!(entries[1].url, "https://drive.google.com/file/d/A/view");
        assert_eq!(entries[1].kind, LinkKind::Migratable);
        assert_eq!(entries[2].kind, LinkKind::Skip);
    }

    #[test]
    fn extracts_id_from_file_path() {
        let id = extract_file_id("https://drive.google.com/file/d/ABC123/view").unwrap();
        assert_eq!(id.as_str(), "ABC123");

        let id = extract_file_id("https://drive.google.com/file/d/1a-B_c/view?usp=sharing").unwrap();
        assert_eq!(id.as_str(), "1a-B_c");
    }

    #[test]
    fn extracts_id_from_query_parameter() {
        let id = extract_file_id("https://drive.google.com/open?id=QUERY_id-1").unwrap();
        assert_eq!(id.as_str(), "QUERY_id-1");
    }

    #[test]
    fn extracts_id_from_short_path() {
        let id = extract_file_id("https://drive.google.com/d/SHORT42/preview").unwrap();
        assert_eq!(id.as_str(), "SHORT42");
    }

    #[test]
    fn extracts_id_from_download_query() {
        let id = extract_file_id("https://drive.google.com/uc?export=download&id=DL99").unwrap();
        assert_eq!(id.as_str(), "DL99");
    }

    #[test]
    fn first_matching_rule_wins() {
        // Both the file path and the query carry an id; the path rule comes first
        let id = extract_file_id("https://drive.google.com/file/d/PATHID/view?id=QUERYID").unwrap();
        assert_eq!(id.as_str(), "PATHID");
    }

    #[test]
    fn unextractable_links_yield_none() {
        assert!(extract_file_id("https://drive.google.com/drive/folders").is_none());
        assert!(extract_file_id("https://drive.google.com/").is_none());
    }

    #[test]
    fn prefix_is_char_bounded() {
        let id = FileId::new("ABCDEFGHIJ");
        assert_eq!(id.prefix(8), "ABCDEFGH");

        let short = FileId::new("ABC123");
        assert_eq!(short.prefix(8), "ABC123");
    }
}
