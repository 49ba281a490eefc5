//! Core types and events for drive-to-release

use serde::{Deserialize, Serialize};

/// Pipeline step of a migratable entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pulling the file from Drive
    Download,
    /// Creating the GitHub release
    CreateRelease,
    /// Uploading the asset
    Upload,
}

impl Stage {
    /// Step number out of [`Stage::COUNT`]
    pub fn number(&self) -> usize {
        match self {
            Stage::Download => 1,
            Stage::CreateRelease => 2,
            Stage::Upload => 3,
        }
    }

    /// Number of stages per entry
    pub const COUNT: usize = 3;
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Download => "Downloading from Google Drive",
            Stage::CreateRelease => "Creating GitHub Release",
            Stage::Upload => "Uploading to GitHub Release",
        };
        f.write_str(label)
    }
}

/// Which download strategy produced (or attempted) a file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    /// Confirmation-aware downloader
    Primary,
    /// Export-endpoint fallback
    Fallback,
}

/// Progress events emitted during a run
///
/// Subscribe with [`crate::Migrator::subscribe`]. Events are informational;
/// dropping the receiver never affects the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// The link list was read and classified
    RunStarted {
        /// Number of migratable Drive links found
        drive_links: usize,
    },

    /// A GitHub link was kept as-is
    Kept {
        /// 1-based line number
        line_number: usize,
    },

    /// A line was neither Drive nor GitHub and was dropped
    Ignored {
        /// 1-based line number
        line_number: usize,
    },

    /// Work on a migratable entry started
    EntryStarted {
        /// Position among migratable entries (1-based)
        index: usize,
        /// Number of migratable entries
        total: usize,
        /// Source link
        url: String,
    },

    /// File name resolved for an entry
    Resolved {
        /// Position among migratable entries
        index: usize,
        /// Drive file id
        file_id: String,
        /// Local file name
        file_name: String,
    },

    /// An entry moved to the next pipeline step
    StageStarted {
        /// Position among migratable entries
        index: usize,
        /// The step now running
        stage: Stage,
    },

    /// The primary downloader gave up; the fallback is being tried
    FallbackStarted {
        /// Drive file id
        file_id: String,
    },

    /// Download progress (throttled)
    DownloadProgress {
        /// Bytes written so far
        downloaded: u64,
        /// Expected size, when Drive announced one
        total: Option<u64>,
    },

    /// A file landed on disk
    Downloaded {
        /// Position among migratable entries
        index: usize,
        /// File size
        bytes: u64,
        /// Strategy that produced it
        method: DownloadMethod,
    },

    /// A release was created
    ReleaseCreated {
        /// Position among migratable entries
        index: usize,
        /// Tag actually used
        tag: String,
    },

    /// The entry was published
    Published {
        /// Position among migratable entries
        index: usize,
        /// Public download URL
        url: String,
    },

    /// The entry failed
    Failed {
        /// Position among migratable entries
        index: usize,
        /// Failure category text
        reason: String,
    },

    /// The run finished and outputs were written
    RunFinished {
        /// Final counters
        summary: RunSummary,
    },
}

/// Counters reported at the end of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Migratable Drive links found in the input
    pub drive_links: usize,
    /// Entries published during this run
    pub converted: usize,
    /// Entries that ended with a failure record
    pub failed: usize,
    /// GitHub links carried over unchanged
    pub kept: usize,
    /// Lines written to the link file
    pub output_links: usize,
}
