//! Utility functions for file naming and file lifecycle

use std::path::{Path, PathBuf};

/// Maximum length of a sanitized file stem
pub const MAX_STEM_LEN: usize = 50;

/// Extension used when the source name has none
pub const DEFAULT_EXTENSION: &str = ".mp4";

/// Replace every character outside `[A-Za-z0-9_-]` with `_` and cap the length
///
/// # Examples
///
/// ```
/// use drive_to_release::utils::sanitize_stem;
///
/// assert_eq!(sanitize_stem("My Clip (final)"), "My_Clip__final_");
/// assert_eq!(sanitize_stem("ok-name_1"), "ok-name_1");
/// ```
#[must_use]
pub fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect()
}

/// A local file name derived from a remote display name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalName {
    /// Sanitized stem, also the basis of the release tag
    pub stem: String,
    /// Extension including the leading dot
    pub extension: String,
}

impl LocalName {
    /// Derive a safe local name from a display name
    ///
    /// The extension is kept as-is (`.mp4` when absent); the stem is sanitized
    /// and truncated.
    ///
    /// # Examples
    ///
    /// ```
    /// use drive_to_release::utils::LocalName;
    ///
    /// let name = LocalName::from_display_name("Team Meeting 03.mov");
    /// assert_eq!(name.file_name(), "Team_Meeting_03.mov");
    ///
    /// let name = LocalName::from_display_name("video_ABC123");
    /// assert_eq!(name.file_name(), "video_ABC123.mp4");
    /// ```
    #[must_use]
    pub fn from_display_name(display_name: &str) -> Self {
        let path = Path::new(display_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(display_name);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(|e| format!(".{e}"))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        Self {
            stem: sanitize_stem(stem),
            extension,
        }
    }

    /// Full file name (`stem` + `extension`)
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{}", self.stem, self.extension)
    }

    /// Base release tag for this file
    #[must_use]
    pub fn release_tag(&self) -> String {
        format!("video-{}", self.stem)
    }
}

/// Remove a file, logging instead of failing
///
/// Returns true when a file was actually removed.
pub fn remove_file_best_effort(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed temporary file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary file");
            false
        }
    }
}

/// A downloaded file owned by one migration entry
///
/// The file is deleted when the guard is dropped, whatever the outcome of the
/// entry was.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Take ownership of `path`
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the artifact
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        remove_file_best_effort(&self.path);
    }
}

/// Write `contents` to `path` through a sibling temp file and a rename
///
/// A crash mid-write leaves the previous file intact.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("'{}' has no file name", path.display()),
            )
        })?;
    let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(e) = tokio::fs::write(&temp_path, contents).await {
        remove_file_best_effort(&temp_path);
        return Err(e);
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        remove_file_best_effort(&temp_path);
        return Err(e);
    }

    Ok(())
}

/// Human-readable byte count in MiB
#[must_use]
pub fn format_mib(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
