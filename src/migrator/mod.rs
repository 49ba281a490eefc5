//! Batch orchestrator
//!
//! [`Migrator`] reads the link list, sends each Drive link through
//! download → release → upload one at a time, then rewrites the link list
//! and, if anything failed, writes the failure report.
//!
//! Nothing runs concurrently: an entry is finished (published or recorded as
//! failed) before the next one starts.

mod entry;

use crate::config::Config;
use crate::drive::{DriveClient, LargeFileDownloader};
use crate::error::{Error, Result};
use crate::github::ReleasePublisher;
use crate::links::{LinkKind, classify_lines};
use crate::report::{FailureRecord, write_report};
use crate::types::{Event, RunSummary};
use crate::utils::write_atomic;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// What a processed batch produced, before anything is written
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
    /// Links for the rewritten list: kept and newly published, in input order
    pub links: Vec<String>,
    /// One record per failed entry, in processing order
    pub failures: Vec<FailureRecord>,
    /// Counters
    pub summary: RunSummary,
}

/// Result of a complete run
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Final counters
    pub summary: RunSummary,
    /// Failure records, also written to the report file
    pub failures: Vec<FailureRecord>,
    /// Where the failure report was written, if it was
    pub report_path: Option<PathBuf>,
}

/// Drives a full migration run
///
/// # Example
///
/// ```no_run
/// use drive_to_release::{Config, Migrator};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::load(None)?;
/// let migrator = Migrator::new(config)?;
///
/// let mut events = migrator.subscribe();
/// tokio::spawn(async move {
///     while let Ok(event) = events.recv().await {
///         println!("{:?}", event);
///     }
/// });
///
/// let report = migrator.run().await?;
/// println!("converted {}", report.summary.converted);
/// # Ok(())
/// # }
/// ```
pub struct Migrator {
    config: Config,
    drive: DriveClient,
    publisher: ReleasePublisher,
    event_tx: broadcast::Sender<Event>,
}

impl Migrator {
    /// Validate `config` and build the Drive and GitHub clients
    ///
    /// # Errors
    /// Returns [`Error::Config`] when credentials are missing or malformed.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);

        let drive = DriveClient::new(&config, event_tx.clone())?;
        let publisher = ReleasePublisher::new(&config)?;

        Ok(Self {
            config,
            drive,
            publisher,
            event_tx,
        })
    }

    /// Replace the primary Drive downloader
    #[must_use]
    pub fn with_downloader(mut self, downloader: Arc<dyn LargeFileDownloader>) -> Self {
        self.drive = self.drive.with_primary(downloader);
        self
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this migrator runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Run the whole job
    ///
    /// Per-entry failures never abort the run; they end up in
    /// [`RunReport::failures`] and the report file.
    ///
    /// # Errors
    /// Returns an error when the link file cannot be read, the temp directory
    /// cannot be created, or the link file cannot be rewritten.
    pub async fn run(&self) -> Result<RunReport> {
        let files = &self.config.files;

        let content = tokio::fs::read_to_string(&files.link_file)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to read link file '{}': {}",
                        files.link_file.display(),
                        e
                    ),
                ))
            })?;

        tokio::fs::create_dir_all(&files.temp_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create temp directory '{}': {}",
                        files.temp_dir.display(),
                        e
                    ),
                ))
            })?;

        let outcome = self.process_lines(content.lines()).await;

        let mut rewritten = String::new();
        for link in &outcome.links {
            rewritten.push_str(link);
            rewritten.push('\n');
        }
        write_atomic(&files.link_file, rewritten.as_bytes())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to write link file '{}': {}",
                        files.link_file.display(),
                        e
                    ),
                ))
            })?;
        info!(
            path = %files.link_file.display(),
            links = outcome.links.len(),
            "link file rewritten"
        );

        let report_path = match write_report(&files.failure_report, &outcome.failures).await {
            Ok(true) => Some(files.failure_report.clone()),
            Ok(false) => None,
            Err(e) => {
                // The link file is already safe; losing the report is not fatal
                tracing::error!(
                    path = %files.failure_report.display(),
                    error = %e,
                    "could not write failure report"
                );
                None
            }
        };

        self.emit_event(Event::RunFinished {
            summary: outcome.summary.clone(),
        });

        Ok(RunReport {
            summary: outcome.summary,
            failures: outcome.failures,
            report_path,
        })
    }

    /// Classify and process raw lines without touching the link or report files
    pub async fn process_lines<'a, I>(&self, lines: I) -> BatchOutcome
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = classify_lines(lines);
        let total = entries
            .iter()
            .filter(|e| e.kind == LinkKind::Migratable)
            .count();

        info!(drive_links = total, "link list classified");
        self.emit_event(Event::RunStarted { drive_links: total });

        let mut outcome = BatchOutcome {
            summary: RunSummary {
                drive_links: total,
                ..RunSummary::default()
            },
            ..BatchOutcome::default()
        };
        let mut index = 0;

        for entry in entries {
            match entry.kind {
                LinkKind::Skip => {}
                LinkKind::Foreign => {
                    debug!(line = entry.line_number, "dropping non-Drive, non-GitHub line");
                    self.emit_event(Event::Ignored {
                        line_number: entry.line_number,
                    });
                }
                LinkKind::AlreadyMigrated => {
                    outcome.links.push(entry.url);
                    outcome.summary.kept += 1;
                    self.emit_event(Event::Kept {
                        line_number: entry.line_number,
                    });
                }
                LinkKind::Migratable => {
                    index += 1;
                    self.emit_event(Event::EntryStarted {
                        index,
                        total,
                        url: entry.url.clone(),
                    });

                    match self.migrate_entry(index, &entry.url).await {
                        Ok(url) => {
                            outcome.links.push(url.clone());
                            outcome.summary.converted += 1;
                            self.emit_event(Event::Published { index, url });
                        }
                        Err(record) => {
                            self.emit_event(Event::Failed {
                                index,
                                reason: record.reason.to_string(),
                            });
                            outcome.failures.push(record);
                            outcome.summary.failed += 1;
                        }
                    }
                }
            }
        }

        outcome.summary.output_links = outcome.links.len();
        outcome
    }
}
