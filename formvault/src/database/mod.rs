//! Database module
//!
//! This module provides all persistence functionality including:
//! - Schema declaration and upgrades
//! - Model definitions
//! - The generic store engine
//! - Domain repositories over the engine

pub mod models;
pub mod repositories;
pub mod schema;
pub mod store;

pub use models::*;
pub use repositories::{
    AnalyticsRepository, BackupQueueRepository, BrandingRepository, ResponseRepository,
    TemplateRepository,
};
pub use schema::{initialize_database, Collection, IndexDef, KeyKind};
pub use store::{IndexValue, Key, Store};

use crate::config::{BUSY_TIMEOUT_SECS, MAX_POOL_CONNECTIONS};
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by upgrade and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
                .journal_mode(SqliteJournalMode::Wal)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// The schema upgrade runs on a dedicated single-connection pool that is
/// closed before the application pool is created, so every application
/// connection sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let upgrade_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&upgrade_pool).await?;
    upgrade_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_POOL_CONNECTIONS)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Single pinned connection to a private in-memory database.
///
/// The connection never idles out, so the database lives exactly as long
/// as the pool.
pub async fn memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}
