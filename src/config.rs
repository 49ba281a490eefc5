//! Configuration types for drive-to-release
//!
//! Configuration is layered: built-in defaults, then an optional JSON file,
//! then environment variables (`GITHUB_TOKEN`, `REPO_NAME`, ...), then CLI flags.
//! [`Config::validate`] runs once at startup so that missing credentials are
//! reported before any link is touched.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the GitHub token
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
/// Environment variable holding the target repository (`owner/name`)
pub const ENV_REPO_NAME: &str = "REPO_NAME";
/// Repository variable set by GitHub Actions, used when `REPO_NAME` is absent
pub const ENV_GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";
/// Optional Google API key for the Drive metadata endpoint
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";

/// GitHub target settings
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Token with write access to the repository's releases
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Target repository as `owner/name`
    #[serde(default)]
    pub repository: String,

    /// REST API base (default: "https://api.github.com")
    #[serde(default = "default_github_api_base")]
    pub api_base: String,

    /// Asset upload base (default: "https://uploads.github.com")
    #[serde(default = "default_github_upload_base")]
    pub upload_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            repository: String::new(),
            api_base: default_github_api_base(),
            upload_base: default_github_upload_base(),
        }
    }
}

// Hand-written so the token never ends up in logs.
impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("repository", &self.repository)
            .field("api_base", &self.api_base)
            .field("upload_base", &self.upload_base)
            .finish()
    }
}

/// Google Drive source settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Metadata API base (default: "https://www.googleapis.com")
    #[serde(default = "default_drive_api_base")]
    pub api_base: String,

    /// Download host (default: "https://drive.google.com")
    #[serde(default = "default_drive_download_base")]
    pub download_base: String,

    /// API key appended to metadata lookups, if any
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_drive_api_base(),
            download_base: default_drive_download_base(),
            api_key: None,
        }
    }
}

/// Input and output locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Link list, read at start and rewritten at the end (default: "drive.txt")
    #[serde(default = "default_link_file")]
    pub link_file: PathBuf,

    /// Failure report, written only when something failed (default: "failed_drive_links.txt")
    #[serde(default = "default_failure_report")]
    pub failure_report: PathBuf,

    /// Working directory for downloaded videos (default: "temp_videos")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            link_file: default_link_file(),
            failure_report: default_failure_report(),
            temp_dir: default_temp_dir(),
        }
    }
}

/// Retry behavior shared by downloads, release creation and uploads
///
/// Unlike a backoff policy, the delay between attempts is fixed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before every attempt after the first (default: 5 seconds)
    #[serde(default = "default_retry_delay", with = "duration_serde")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay: default_retry_delay(),
        }
    }
}

/// Per-call network timeouts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Drive metadata lookup (default: 10 seconds)
    #[serde(default = "default_metadata_timeout", with = "duration_serde")]
    pub metadata: Duration,

    /// GitHub release listing and creation (default: 30 seconds)
    #[serde(default = "default_release_api_timeout", with = "duration_serde")]
    pub release_api: Duration,

    /// Drive download requests, applied to headers and to each body read (default: 120 seconds)
    #[serde(default = "default_download_timeout", with = "duration_serde")]
    pub download: Duration,

    /// Whole asset upload request (default: 900 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub upload: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata_timeout(),
            release_api: default_release_api_timeout(),
            download: default_download_timeout(),
            upload: default_upload_timeout(),
        }
    }
}

/// Pauses between steps that keep the request rate towards GitHub low
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Pause after a successful download (default: 2 seconds)
    #[serde(default = "default_step_pause", with = "duration_serde")]
    pub after_download: Duration,

    /// Pause after the release was created (default: 2 seconds)
    #[serde(default = "default_step_pause", with = "duration_serde")]
    pub after_release: Duration,

    /// Pause after each migrated entry (default: 1 second)
    #[serde(default = "default_entry_pause", with = "duration_serde")]
    pub between_entries: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_download: default_step_pause(),
            after_release: default_step_pause(),
            between_entries: default_entry_pause(),
        }
    }
}

impl PacingConfig {
    /// Pacing with every pause set to zero
    pub fn none() -> Self {
        Self {
            after_download: Duration::ZERO,
            after_release: Duration::ZERO,
            between_entries: Duration::ZERO,
        }
    }
}

/// Main configuration for the migrator
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// GitHub target
    #[serde(default)]
    pub github: GitHubConfig,

    /// Google Drive source
    #[serde(default)]
    pub drive: DriveConfig,

    /// File locations
    #[serde(default)]
    pub files: FilesConfig,

    /// Retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Network timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Rate pacing
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl Config {
    /// Load configuration from an optional JSON file and the process environment
    ///
    /// A `.env` file in the working directory is honoured. The result is not
    /// validated yet; call [`Config::validate`] once CLI overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        dotenvy::dotenv().ok();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overlay values from environment-style lookups
    ///
    /// Empty values are ignored. `REPO_NAME` wins over `GITHUB_REPOSITORY`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(ENV_GITHUB_TOKEN) {
            self.github.token = token.trim().to_string();
        }
        if let Some(repo) = non_empty(ENV_REPO_NAME).or_else(|| non_empty(ENV_GITHUB_REPOSITORY)) {
            self.github.repository = repo.trim().to_string();
        }
        if let Some(key) = non_empty(ENV_GOOGLE_API_KEY) {
            self.drive.api_key = Some(key.trim().to_string());
        }
    }

    /// Check that the job can run at all
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the token or repository is missing or
    /// malformed, or when the retry budget is zero.
    pub fn validate(&self) -> Result<()> {
        if self.github.token.is_empty() {
            return Err(Error::config(
                "GitHub token is not set",
                ENV_GITHUB_TOKEN,
            ));
        }

        if self.github.repository.is_empty() {
            return Err(Error::config(
                "target repository is not set",
                ENV_REPO_NAME,
            ));
        }

        let mut parts = self.github.repository.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !well_formed {
            return Err(Error::config(
                format!(
                    "repository must look like 'owner/name', got '{}'",
                    self.github.repository
                ),
                ENV_REPO_NAME,
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts must be at least 1",
                "retry.max_attempts",
            ));
        }

        Ok(())
    }
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_upload_base() -> String {
    "https://uploads.github.com".to_string()
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com".to_string()
}

fn default_drive_download_base() -> String {
    "https://drive.google.com".to_string()
}

fn default_link_file() -> PathBuf {
    PathBuf::from("drive.txt")
}

fn default_failure_report() -> PathBuf {
    PathBuf::from("failed_drive_links.txt")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp_videos")
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_release_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(900)
}

fn default_step_pause() -> Duration {
    Duration::from_secs(2)
}

fn default_entry_pause() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.github.token = "ghp_test".to_string();
        config.github.repository = "octo/videos".to_string();
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.files.link_file, PathBuf::from("drive.txt"));
        assert_eq!(
            config.files.failure_report,
            PathBuf::from("failed_drive_links.txt")
        );
        assert_eq!(config.files.temp_dir, PathBuf::from("temp_videos"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(5));
        assert_eq!(config.timeouts.metadata, Duration::from_secs(10));
        assert_eq!(config.timeouts.release_api, Duration::from_secs(30));
        assert_eq!(config.timeouts.download, Duration::from_secs(120));
        assert_eq!(config.timeouts.upload, Duration::from_secs(900));
        assert_eq!(config.pacing.after_download, Duration::from_secs(2));
        assert_eq!(config.pacing.after_release, Duration::from_secs(2));
        assert_eq!(config.pacing.between_entries, Duration::from_secs(1));
    }

    #[test]
    fn env_overlay_sets_credentials() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("GITHUB_TOKEN", " ghp_abc \n"),
            ("REPO_NAME", "octo/videos"),
            ("GOOGLE_API_KEY", "AIza-key"),
        ]));

        assert_eq!(config.github.token, "ghp_abc");
        assert_eq!(config.github.repository, "octo/videos");
        assert_eq!(config.drive.api_key.as_deref(), Some("AIza-key"));
    }

    #[test]
    fn repo_name_wins_over_github_repository() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("REPO_NAME", "octo/chosen"),
            ("GITHUB_REPOSITORY", "octo/actions-default"),
        ]));
        assert_eq!(config.github.repository, "octo/chosen");
    }

    #[test]
    fn github_repository_is_used_when_repo_name_missing() {
        let mut config = Config::default();
        config.apply_env(lookup_from(&[
            ("REPO_NAME", "   "),
            ("GITHUB_REPOSITORY", "octo/actions-default"),
        ]));
        assert_eq!(config.github.repository, "octo/actions-default");
    }

    #[test]
    fn validate_accepts_complete_config() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn validate_rejects_missing_token() {
        let mut config = valid_config();
        config.github.token.clear();

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("GITHUB_TOKEN")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_missing_repository() {
        let mut config = valid_config();
        config.github.repository.clear();

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("REPO_NAME")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_malformed_repository() {
        for bad in ["videos", "octo/", "/videos", "octo/videos/extra"] {
            let mut config = valid_config();
            config.github.repository = bad.to_string();
            assert!(
                config.validate().is_err(),
                "repository '{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn validate_rejects_zero_attempts() {
        let mut config = valid_config();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{"retry":{"max_attempts":5},"files":{"link_file":"links.txt"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_secs(5));
        assert_eq!(config.files.link_file, PathBuf::from("links.txt"));
        assert_eq!(config.files.temp_dir, PathBuf::from("temp_videos"));
        assert_eq!(config.github.api_base, "https://api.github.com");
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(TimeoutConfig::default()).unwrap();
        assert_eq!(json["metadata"], 10);
        assert_eq!(json["upload"], 900);
    }

    #[test]
    fn token_is_never_serialized_or_debug_printed() {
        let config = valid_config();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("ghp_test"), "token leaked into JSON: {json}");

        let debug = format!("{config:?}");
        assert!(!debug.contains("ghp_test"), "token leaked into Debug: {debug}");
    }

    #[test]
    fn from_file_reports_unreadable_path() {
        let result = Config::from_file(Path::new("/nonexistent/drive-to-release.json"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
