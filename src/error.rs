//! Error types for drive-to-release
//!
//! This module provides the error hierarchy for the migrator:
//! - A top-level [`Error`] used by configuration loading and the batch run
//! - [`FetchError`] for everything that can go wrong while pulling a file from Drive
//! - [`PublishError`] for GitHub release creation and asset upload failures
//!
//! Per-entry errors never abort a run; the orchestrator turns them into failure
//! records. Only configuration errors and an unreadable link file surface as
//! [`Error`] from [`crate::Migrator::run`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for drive-to-release operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for drive-to-release
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key or environment variable that caused the error
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Drive download failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// GitHub release or upload failed
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Errors raised while fetching a file from Google Drive
#[derive(Debug, Error)]
pub enum FetchError {
    /// The file is not publicly readable; retrying cannot help
    #[error("access denied for Drive file {file_id}: {reason}")]
    AccessDenied {
        /// Drive file id
        file_id: String,
        /// What Drive said (status line or page text)
        reason: String,
    },

    /// Drive answered with an unexpected HTTP status
    #[error("Drive returned HTTP {status} for file {file_id}")]
    Status {
        /// Drive file id
        file_id: String,
        /// HTTP status code
        status: u16,
    },

    /// Drive served a confirmation page we could not get past
    #[error("no download confirmation found for Drive file {file_id}")]
    ConfirmationNotFound {
        /// Drive file id
        file_id: String,
    },

    /// The download finished but produced no file
    #[error("download produced no file at {}", path.display())]
    MissingFile {
        /// Expected output path
        path: PathBuf,
    },

    /// The download finished but the file is empty
    #[error("downloaded file {} is empty", path.display())]
    EmptyFile {
        /// Output path of the empty file (already removed)
        path: PathBuf,
    },

    /// No data arrived within the read timeout
    #[error("download stalled: no data for {seconds}s")]
    Stalled {
        /// Read timeout that expired
        seconds: u64,
    },

    /// Transport-level HTTP failure
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while creating a release or uploading an asset
#[derive(Debug, Error)]
pub enum PublishError {
    /// GitHub refused to create the release
    #[error("release {tag} rejected with HTTP {status}: {body}")]
    CreateRejected {
        /// Tag that was submitted
        tag: String,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// GitHub refused the asset upload
    #[error("upload of {asset} rejected with HTTP {status}: {body}")]
    UploadRejected {
        /// Asset file name
        asset: String,
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Transport-level HTTP failure
    #[error("{operation} failed: {source}")]
    Transport {
        /// Which call failed ("create release", "upload asset", ...)
        operation: &'static str,
        /// Underlying reqwest error
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with success but the payload was unusable
    #[error("unexpected GitHub response: {0}")]
    InvalidResponse(String),

    /// Reading the local asset failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
