//! Backup service
//!
//! Exports the whole dataset as one snapshot document and restores
//! datasets from such documents. Snapshots are also written to and read
//! from pretty-printed JSON files for download and restore.
//!
//! Import writes record by record through the repositories. It stops at
//! the first record that cannot be saved; records written before that
//! point stay written.

use crate::config::EXPORT_FILE_PREFIX;
use crate::database::{
    event_types, to_fields, AnalyticsRepository, BackupQueueItem, BackupQueueRepository,
    BrandingRecord, BrandingRepository, BrandingUpdate, Collection, Response, ResponseRepository,
    Snapshot, SnapshotDocument, Template, TemplateRepository,
};
use crate::error::{AppError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Counts of what an import wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub branding: bool,
    pub templates: usize,
    pub responses: usize,
    /// Analytics events present in the snapshot and deliberately not replayed
    pub skipped_analytics: usize,
}

/// Backup service
#[derive(Clone)]
pub struct BackupService {
    branding: BrandingRepository,
    templates: TemplateRepository,
    responses: ResponseRepository,
    analytics: AnalyticsRepository,
    queue: BackupQueueRepository,
}

impl BackupService {
    pub fn new(
        branding: BrandingRepository,
        templates: TemplateRepository,
        responses: ResponseRepository,
        analytics: AnalyticsRepository,
        queue: BackupQueueRepository,
    ) -> Self {
        Self {
            branding,
            templates,
            responses,
            analytics,
            queue,
        }
    }

    /// Read every collection except the backup queue into a snapshot.
    ///
    /// Pure read: nothing is written, not even an analytics event.
    pub async fn export_all(&self) -> Result<Snapshot> {
        let (branding, templates, responses, analytics) = tokio::try_join!(
            self.branding.get(),
            self.templates.get_all(),
            self.responses.get_all(),
            self.analytics.get_all(),
        )?;

        tracing::info!(
            "Exported {} templates, {} responses, {} events",
            templates.len(),
            responses.len(),
            analytics.len()
        );

        Ok(Snapshot {
            branding,
            templates,
            responses,
            analytics,
            exported_at: Utc::now(),
        })
    }

    /// Restore a snapshot, overwriting records that share an id.
    ///
    /// Analytics events are not replayed: the log is append-only, and
    /// replaying would double its history on every repeated import.
    pub async fn import_all(&self, snapshot: Snapshot) -> Result<ImportSummary> {
        self.import_document(SnapshotDocument::from_snapshot(&snapshot)?)
            .await
    }

    /// Restore a snapshot whose records have not been decoded yet.
    ///
    /// Records are decoded and written in order. The first one that fails
    /// either step stops the import with its collection and position.
    pub async fn import_document(&self, document: SnapshotDocument) -> Result<ImportSummary> {
        tracing::info!(
            "Importing snapshot exported at {:?} ({} templates, {} responses)",
            document.exported_at,
            document.templates.len(),
            document.responses.len()
        );

        let mut summary = ImportSummary {
            skipped_analytics: document.analytics.len(),
            ..Default::default()
        };

        if let Some(raw) = document.branding {
            let branding: BrandingRecord = decode(Collection::Branding, 0, raw)?;
            self.branding
                .save(BrandingUpdate::from(branding))
                .await
                .map_err(|e| import_failed(Collection::Branding, 0, e))?;
            summary.branding = true;
        }

        for (index, raw) in document.templates.into_iter().enumerate() {
            let template: Template = decode(Collection::Templates, index, raw)?;
            self.templates
                .restore(template)
                .await
                .map_err(|e| import_failed(Collection::Templates, index, e))?;
            summary.templates += 1;
        }

        for (index, raw) in document.responses.into_iter().enumerate() {
            let response: Response = decode(Collection::Responses, index, raw)?;
            self.responses
                .save(response)
                .await
                .map_err(|e| import_failed(Collection::Responses, index, e))?;
            summary.responses += 1;
        }

        if summary.skipped_analytics > 0 {
            tracing::info!(
                "Skipped {} analytics events from snapshot",
                summary.skipped_analytics
            );
        }

        tracing::info!(
            "Import complete: {} templates, {} responses",
            summary.templates,
            summary.responses
        );

        Ok(summary)
    }

    /// Write a snapshot file into `dir` and return its path
    pub async fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).await?;

        let snapshot = self.export_all().await?;
        let file_name = format!(
            "{}{}.json",
            EXPORT_FILE_PREFIX,
            snapshot.exported_at.timestamp_millis()
        );
        let path = dir.join(file_name);

        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&path, json).await?;

        self.analytics
            .log(
                event_types::DATA_EXPORT,
                to_fields(json!({ "timestamp": snapshot.exported_at, "path": path.display().to_string() })),
            )
            .await?;

        tracing::info!("Snapshot written to {:?}", path);
        Ok(path)
    }

    /// Read a snapshot file and import it
    pub async fn import_from_file(&self, path: &Path) -> Result<ImportSummary> {
        tracing::info!("Importing snapshot file: {:?}", path);

        let data = fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found("Snapshot file", path.display()),
            _ => AppError::Io(e),
        })?;
        let document: SnapshotDocument = serde_json::from_slice(&data)
            .map_err(|e| AppError::InvalidSnapshot(e.to_string()))?;

        let summary = self.import_document(document).await?;

        self.analytics
            .log(
                event_types::DATA_IMPORT,
                to_fields(json!({ "templates": summary.templates, "responses": summary.responses })),
            )
            .await?;

        Ok(summary)
    }

    /// Put a marker on the backup queue for the next synchronization pass
    pub async fn queue_for_sync(&self, reason: &str) -> Result<BackupQueueItem> {
        let (templates, responses) =
            tokio::try_join!(self.templates.count(), self.responses.count())?;

        self.queue
            .enqueue(to_fields(json!({
                "kind": "snapshot",
                "reason": reason,
                "templates": templates,
                "responses": responses,
            })))
            .await
    }

    pub async fn pending(&self) -> Result<Vec<BackupQueueItem>> {
        self.queue.get_all().await
    }

    /// Hand the pending queue to a sync collaborator and empty it
    pub async fn drain_queue(&self) -> Result<Vec<BackupQueueItem>> {
        let items = self.queue.get_all().await?;
        self.queue.clear().await?;

        tracing::info!("Drained {} backup queue items", items.len());
        Ok(items)
    }
}

fn decode<R: DeserializeOwned>(collection: Collection, index: usize, raw: Value) -> Result<R> {
    serde_json::from_value(raw).map_err(|e| {
        import_failed(
            collection,
            index,
            AppError::InvalidRecord {
                collection,
                reason: e.to_string(),
            },
        )
    })
}

fn import_failed(collection: Collection, index: usize, source: AppError) -> AppError {
    tracing::warn!("Import stopped at {}[{}]: {}", collection, index, source);
    AppError::ImportFailed {
        collection,
        index,
        source: Box::new(source),
    }
}
