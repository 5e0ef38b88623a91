//! Database schema and upgrades
//!
//! Declares the five collections of the store, their primary keys and
//! secondary indexes, and creates whatever is missing when the declared
//! schema version is newer than the stored one.
//!
//! Each collection is one table holding the JSON body of every record
//! next to its primary key; each secondary index is an expression index
//! over the indexed attribute.

use crate::config::{DATABASE_NAME, SCHEMA_VERSION};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::fmt;

/// Attribute every collection uses as its primary key.
pub const KEY_PATH: &str = "id";

/// How a collection obtains its primary keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Caller supplies a text key (the branding singleton)
    Fixed,
    /// Store assigns monotonically increasing integer keys, never reused
    AutoIncrement,
}

/// Non-unique secondary index over one record attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDef {
    pub name: &'static str,
    pub key_path: &'static str,
}

/// Named collections of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Branding,
    Templates,
    Responses,
    Analytics,
    BackupQueue,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Branding,
        Collection::Templates,
        Collection::Responses,
        Collection::Analytics,
        Collection::BackupQueue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Branding => "branding",
            Collection::Templates => "templates",
            Collection::Responses => "responses",
            Collection::Analytics => "analytics",
            Collection::BackupQueue => "backupQueue",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            Collection::BackupQueue => "backup_queue",
            other => other.name(),
        }
    }

    pub fn key_kind(self) -> KeyKind {
        match self {
            Collection::Branding => KeyKind::Fixed,
            _ => KeyKind::AutoIncrement,
        }
    }

    pub fn indexes(self) -> &'static [IndexDef] {
        match self {
            Collection::Branding => &[],
            Collection::Templates => &[
                IndexDef { name: "name", key_path: "name" },
                IndexDef { name: "createdAt", key_path: "createdAt" },
            ],
            Collection::Responses => &[
                IndexDef { name: "templateId", key_path: "templateId" },
                IndexDef { name: "clientName", key_path: "clientName" },
                IndexDef { name: "submittedAt", key_path: "submittedAt" },
            ],
            Collection::Analytics => &[
                IndexDef { name: "eventType", key_path: "eventType" },
                IndexDef { name: "timestamp", key_path: "timestamp" },
            ],
            Collection::BackupQueue => &[IndexDef { name: "timestamp", key_path: "timestamp" }],
        }
    }

    pub fn index(self, name: &str) -> Option<&'static IndexDef> {
        self.indexes().iter().find(|index| index.name == name)
    }

    fn create_table_sql(self) -> String {
        let key_column = match self.key_kind() {
            KeyKind::Fixed => "id TEXT PRIMARY KEY NOT NULL",
            KeyKind::AutoIncrement => "id INTEGER PRIMARY KEY AUTOINCREMENT",
        };
        format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" ({}, value TEXT NOT NULL)"#,
            self.table(),
            key_column
        )
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl IndexDef {
    pub(crate) fn expression(&self) -> String {
        format!("json_extract(value, '$.{}')", self.key_path)
    }

    fn sql_name(&self, collection: Collection) -> String {
        format!("idx_{}_{}", collection.table(), self.name)
    }

    fn create_sql(&self, collection: Collection) -> String {
        format!(
            r#"CREATE INDEX IF NOT EXISTS "{}" ON "{}" ({})"#,
            self.sql_name(collection),
            collection.table(),
            self.expression()
        )
    }
}

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version = stored_version(pool).await?;

    tracing::info!("Current database version: {}", current_version);

    if current_version > SCHEMA_VERSION {
        return Err(AppError::StorageUnavailable(format!(
            "stored schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    if current_version < SCHEMA_VERSION {
        upgrade(pool, SCHEMA_VERSION).await?;
    }

    tracing::info!("Database initialization complete");
    Ok(())
}

/// Highest schema version recorded in the store, 0 for a fresh database.
pub async fn stored_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Create every collection and index not yet present, then record `version`.
///
/// Runs in a single transaction: a failure leaves the previous schema in
/// place and a later run creates the remainder.
pub async fn upgrade(pool: &SqlitePool, version: i64) -> Result<()> {
    tracing::info!("Upgrading schema to version {}", version);

    let mut tx = pool.begin().await?;

    for collection in Collection::ALL {
        sqlx::query(&collection.create_table_sql())
            .execute(&mut *tx)
            .await?;

        for index in collection.indexes() {
            sqlx::query(&index.create_sql(collection))
                .execute(&mut *tx)
                .await?;
        }

        tracing::debug!("Collection ready: {}", collection);
    }

    sqlx::query("INSERT OR REPLACE INTO schema_version (version, name) VALUES (?, ?)")
        .bind(version)
        .bind(DATABASE_NAME)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Schema version {} applied successfully", version);
    Ok(())
}

/// Names of the collection tables currently present.
pub async fn existing_tables(pool: &SqlitePool) -> Result<Vec<String>> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

/// Names of the secondary indexes currently present.
pub async fn existing_indexes(pool: &SqlitePool) -> Result<Vec<String>> {
    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await?;
    Ok(indexes)
}
