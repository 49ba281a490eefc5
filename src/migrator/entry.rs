//! Per-entry pipeline: identify → fetch → create release → upload

use super::Migrator;
use crate::links::extract_file_id;
use crate::report::{FailureReason, FailureRecord};
use crate::types::{Event, Stage};
use crate::utils::{LocalName, TempArtifact};
use tracing::{info, warn};

impl Migrator {
    /// Migrate one Drive link, returning the published URL
    ///
    /// The downloaded file lives in a [`TempArtifact`] and is gone when this
    /// returns, whatever the outcome.
    pub(crate) async fn migrate_entry(
        &self,
        index: usize,
        url: &str,
    ) -> std::result::Result<String, FailureRecord> {
        let Some(file_id) = extract_file_id(url) else {
            warn!(url, "could not extract a Drive file id");
            return Err(FailureRecord::new(url, FailureReason::InvalidUrl));
        };

        let display_name = self.drive.resolve_name(&file_id).await;
        let local = LocalName::from_display_name(&display_name);
        let file_name = local.file_name();
        info!(file_id = %file_id, file_name = %file_name, "resolved file name");
        self.emit_event(Event::Resolved {
            index,
            file_id: file_id.to_string(),
            file_name: file_name.clone(),
        });

        let artifact = TempArtifact::new(self.config.files.temp_dir.join(&file_name));
        let pacing = &self.config.pacing;

        // Step 1: download
        self.emit_event(Event::StageStarted {
            index,
            stage: Stage::Download,
        });
        let download = self
            .drive
            .download(&file_id, artifact.path())
            .await
            .map_err(|e| {
                FailureRecord::new(url, FailureReason::DownloadFailed)
                    .with_filename(&file_name)
                    .with_detail(e)
            })?;
        self.emit_event(Event::Downloaded {
            index,
            bytes: download.bytes,
            method: download.method,
        });
        tokio::time::sleep(pacing.after_download).await;

        // Step 2: release
        self.emit_event(Event::StageStarted {
            index,
            stage: Stage::CreateRelease,
        });
        let release = self
            .publisher
            .create_release(&local.release_tag())
            .await
            .map_err(|e| {
                FailureRecord::new(url, FailureReason::ReleaseCreationFailed)
                    .with_filename(&file_name)
                    .with_detail(e)
            })?;
        self.emit_event(Event::ReleaseCreated {
            index,
            tag: release.tag_name.clone(),
        });
        tokio::time::sleep(pacing.after_release).await;

        // Step 3: upload
        self.emit_event(Event::StageStarted {
            index,
            stage: Stage::Upload,
        });
        let uploaded = self.publisher.upload_asset(&release, artifact.path()).await;
        drop(artifact);
        tokio::time::sleep(pacing.between_entries).await;

        uploaded.map_err(|e| {
            FailureRecord::new(url, FailureReason::UploadFailed)
                .with_filename(&file_name)
                .with_release_tag(&release.tag_name)
                .with_detail(e)
        })
    }
}
