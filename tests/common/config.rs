//! Test configuration pointing every endpoint at one mock server

use drive_to_release::Config;
use drive_to_release::config::PacingConfig;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Test workspace: a temp directory holding the link file, report and downloads
pub struct Workspace {
    /// Keeps the directory alive for the test
    pub dir: TempDir,
    /// Configuration wired to the mock server and the workspace
    pub config: Config,
}

impl Workspace {
    /// Create a workspace whose Drive and GitHub endpoints are `server_uri`
    pub fn new(server_uri: &str) -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.github.token = "ghp_e2e".to_string();
        config.github.repository = "octo/videos".to_string();
        config.github.api_base = server_uri.to_string();
        config.github.upload_base = server_uri.to_string();
        config.drive.api_base = server_uri.to_string();
        config.drive.download_base = server_uri.to_string();
        config.files.link_file = dir.path().join("drive.txt");
        config.files.failure_report = dir.path().join("failed_drive_links.txt");
        config.files.temp_dir = dir.path().join("temp_videos");
        config.retry.delay = Duration::from_millis(10);
        config.timeouts.download = Duration::from_secs(5);
        config.pacing = PacingConfig::none();

        Self { dir, config }
    }

    /// Write the link file
    pub fn write_links(&self, content: &str) {
        std::fs::write(&self.config.files.link_file, content).unwrap();
    }

    /// Current link file lines
    pub fn links(&self) -> Vec<String> {
        std::fs::read_to_string(&self.config.files.link_file)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Failure report text, if one was written
    pub fn report(&self) -> Option<String> {
        std::fs::read_to_string(&self.config.files.failure_report).ok()
    }

    /// Files left in the download directory
    pub fn leftover_downloads(&self) -> Vec<String> {
        list_files(&self.config.files.temp_dir)
    }
}

fn list_files(dir: &Path) -> Vec<String> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    }
}
