//! # drive-to-release
//!
//! Batch migrator that moves videos hosted on Google Drive into GitHub Release
//! assets and rewrites the link list to point at the new URLs.
//!
//! ## How a run works
//!
//! - The link list is classified line by line: GitHub links are kept, Drive
//!   links are migrated, everything else is dropped
//! - Each Drive link is downloaded (with a confirmation-aware primary strategy
//!   and an export-endpoint fallback), published as the single asset of a new
//!   release, and its temporary file removed
//! - The link list is rewritten with kept and newly published URLs; failures
//!   go to a separate report
//!
//! Entries are processed strictly one after another.
//!
//! ## Quick Start
//!
//! ```no_run
//! use drive_to_release::{Config, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::load(None)?;
//!     config.github.repository = "octo/videos".to_string();
//!
//!     let migrator = Migrator::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = migrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = migrator.run().await?;
//!     println!("{} failed", report.summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Google Drive source fetcher
pub mod drive;
/// Error types
pub mod error;
/// GitHub release publisher
pub mod github;
/// Link classification
pub mod links;
/// Batch orchestrator
pub mod migrator;
/// Failure records and report
pub mod report;
/// Retry logic with a fixed delay
pub mod retry;
/// Core types and events
pub mod types;
/// File naming and file lifecycle helpers
pub mod utils;

pub use config::Config;
pub use error::{Error, FetchError, PublishError, Result};
pub use migrator::{Migrator, RunReport};
pub use report::{FailureReason, FailureRecord};
pub use types::{Event, RunSummary};
