//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! The store is opened once here and every repository and service is
//! built on top of that one handle.

use crate::config::{DATABASE_FILE_NAME, EXPORTS_DIR_NAME};
use crate::database::{
    event_types, to_fields, AnalyticsRepository, BackupQueueRepository, BrandingRecord,
    BrandingRepository, BrandingUpdate, Fields, ResponseRepository, Store, TemplateRepository,
};
use crate::error::{AppError, Result};
use crate::services::{
    AnalyticsService, BackupService, DocumentService, FormsService, SamplesService,
};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub store: Store,
    pub branding: BrandingRepository,
    pub forms: FormsService,
    pub documents: DocumentService,
    pub analytics: AnalyticsService,
    pub backup: BackupService,
    pub samples: SamplesService,
}

impl AppState {
    /// Open the store under `data_dir` and build the services.
    ///
    /// Layout: `<data_dir>/formvault.sqlite` and `<data_dir>/exports/`.
    pub async fn initialize(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application");
        tracing::info!("Data directory: {:?}", data_dir);

        for dir in [data_dir.to_path_buf(), data_dir.join(EXPORTS_DIR_NAME)] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::StorageUnavailable(format!("Cannot create {:?}: {}", dir, e))
            })?;
        }

        let store = Store::open(&data_dir.join(DATABASE_FILE_NAME)).await?;
        let state = Self::with_store(data_dir.to_path_buf(), store)?;

        state.analytics.log(event_types::APP_START, Fields::new()).await?;

        tracing::info!("Application initialized successfully");
        Ok(state)
    }

    /// Wire every repository and service to `store`
    pub fn with_store(data_dir: PathBuf, store: Store) -> Result<Self> {
        let branding = BrandingRepository::new(store.clone());
        let templates = TemplateRepository::new(store.clone());
        let responses = ResponseRepository::new(store.clone());
        let analytics = AnalyticsRepository::new(store.clone());
        let queue = BackupQueueRepository::new(store.clone());

        Ok(Self {
            forms: FormsService::new(templates.clone(), responses.clone(), analytics.clone()),
            documents: DocumentService::new(
                branding.clone(),
                templates.clone(),
                responses.clone(),
                analytics.clone(),
            ),
            analytics: AnalyticsService::new(analytics.clone(), templates.clone(), responses.clone()),
            backup: BackupService::new(branding.clone(), templates.clone(), responses, analytics, queue),
            samples: SamplesService::new(templates)?,
            branding,
            data_dir,
            store,
        })
    }

    /// Save branding and log whether this was the first-run setup
    pub async fn setup_branding(&self, update: BrandingUpdate) -> Result<BrandingRecord> {
        let is_first_time = self.branding.get().await?.is_none();
        let record = self.branding.save(update).await?;

        self.analytics
            .log(
                event_types::BRANDING_SETUP,
                to_fields(json!({ "isFirstTime": is_first_time })),
            )
            .await?;

        Ok(record)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_dir.join(EXPORTS_DIR_NAME)
    }

    pub async fn shutdown(&self) {
        tracing::info!("Closing store");
        self.store.close().await;
    }
}
