//! Generic store engine
//!
//! Per-collection primitives over the SQLite pool: insert with generated
//! key, upsert by key, get, get-all, index query, delete and clear.
//! Records cross this boundary as any serde type; the `id` attribute is
//! the primary key and is kept in its own column rather than in the body.
//!
//! Every operation runs in its own transaction, committed on success and
//! rolled back when dropped on an error path.

use super::schema::{Collection, KeyKind, KEY_PATH};
use super::{create_pool, initialize_database, memory_pool};
use crate::error::{AppError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::path::Path;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Primary key of a stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    /// Integer value of a generated key
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(id) => Some(*id),
            Key::Text(_) => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Key::Int(id) => Value::from(*id),
            Key::Text(name) => Value::from(name.as_str()),
        }
    }

    fn from_json(collection: Collection, value: &Value) -> Result<Option<Key>> {
        let key = match value {
            Value::Null => return Ok(None),
            Value::Number(number) => match number.as_i64() {
                Some(id) if id > 0 => Key::Int(id),
                _ => return Err(invalid(collection, format!("key {} is not a positive integer", number))),
            },
            Value::String(name) => Key::Text(name.clone()),
            other => return Err(invalid(collection, format!("unsupported key {}", other))),
        };
        key.check_kind(collection)?;
        Ok(Some(key))
    }

    fn check_kind(&self, collection: Collection) -> Result<()> {
        match (collection.key_kind(), self) {
            (KeyKind::AutoIncrement, Key::Int(_)) | (KeyKind::Fixed, Key::Text(_)) => Ok(()),
            _ => Err(invalid(collection, format!("key {} has the wrong type", self))),
        }
    }

    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            Key::Int(id) => query.bind(*id),
            Key::Text(name) => query.bind(name.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(id) => write!(f, "{}", id),
            Key::Text(name) => f.write_str(name),
        }
    }
}

impl From<i64> for Key {
    fn from(id: i64) -> Self {
        Key::Int(id)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Text(name.to_string())
    }
}

/// Value looked up through a secondary index
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl IndexValue {
    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            IndexValue::Int(value) => query.bind(*value),
            IndexValue::Real(value) => query.bind(*value),
            IndexValue::Text(value) => query.bind(value.clone()),
            // json_extract yields 1/0 for JSON booleans
            IndexValue::Bool(value) => query.bind(i64::from(*value)),
        }
    }
}

impl From<i64> for IndexValue {
    fn from(value: i64) -> Self {
        IndexValue::Int(value)
    }
}

impl From<f64> for IndexValue {
    fn from(value: f64) -> Self {
        IndexValue::Real(value)
    }
}

impl From<bool> for IndexValue {
    fn from(value: bool) -> Self {
        IndexValue::Bool(value)
    }
}

impl From<&str> for IndexValue {
    fn from(value: &str) -> Self {
        IndexValue::Text(value.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(value: String) -> Self {
        IndexValue::Text(value)
    }
}

/// Handle to the local database, shared by every repository
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Wrap a pool whose schema is already initialized
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if absent) the store at `db_path`.
    ///
    /// Any failure to open or upgrade surfaces as `StorageUnavailable`.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = create_pool(db_path).await.map_err(unavailable)?;
        Ok(Self::new(pool))
    }

    /// Open a private in-memory store
    pub async fn open_in_memory() -> Result<Self> {
        let pool = memory_pool().await.map_err(unavailable)?;
        initialize_database(&pool).await.map_err(unavailable)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Insert a new record, generating its key when it carries none.
    pub async fn insert<R: Serialize>(&self, collection: Collection, record: &R) -> Result<Key> {
        let (key, body) = encode_record(collection, record)?;

        let mut tx = self.pool.begin().await?;

        let key = match key {
            Some(key) => {
                if key_exists(&mut *tx, collection, &key).await? {
                    return Err(AppError::DuplicateKey {
                        collection,
                        key: key.to_string(),
                    });
                }

                let sql = format!(r#"INSERT INTO "{}" (id, value) VALUES (?, ?)"#, collection.table());
                key.bind(sqlx::query(&sql))
                    .bind(body)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| insert_error(e, collection, &key))?;
                key
            }
            None => insert_generated(&mut *tx, collection, body).await?,
        };

        tx.commit().await?;

        tracing::debug!("Inserted {} record: {}", collection, key);
        Ok(key)
    }

    /// Write a record at its key, creating or overwriting it.
    pub async fn upsert<R: Serialize>(&self, collection: Collection, record: &R) -> Result<Key> {
        let (key, body) = encode_record(collection, record)?;

        let mut tx = self.pool.begin().await?;

        let key = match key {
            Some(key) => {
                let sql = format!(
                    r#"
                    INSERT INTO "{}" (id, value) VALUES (?, ?)
                    ON CONFLICT(id) DO UPDATE SET value = excluded.value
                    "#,
                    collection.table()
                );
                key.bind(sqlx::query(&sql))
                    .bind(body)
                    .execute(&mut *tx)
                    .await?;
                key
            }
            None => insert_generated(&mut *tx, collection, body).await?,
        };

        tx.commit().await?;

        tracing::debug!("Upserted {} record: {}", collection, key);
        Ok(key)
    }

    /// Get a record by key
    pub async fn get<R: DeserializeOwned>(
        &self,
        collection: Collection,
        key: impl Into<Key>,
    ) -> Result<Option<R>> {
        let key = key.into();
        key.check_kind(collection)?;

        let mut tx = self.pool.begin().await?;

        let sql = format!(r#"SELECT value FROM "{}" WHERE id = ?"#, collection.table());
        let body: Option<String> = match &key {
            Key::Int(id) => sqlx::query_scalar(&sql).bind(*id).fetch_optional(&mut *tx).await?,
            Key::Text(name) => {
                sqlx::query_scalar(&sql)
                    .bind(name.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
            }
        };

        tx.commit().await?;

        body.map(|body| decode_record(key, &body)).transpose()
    }

    /// All records of a collection in key order
    pub async fn get_all<R: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<R>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(r#"SELECT id, value FROM "{}" ORDER BY id"#, collection.table());
        let rows = sqlx::query(&sql).fetch_all(&mut *tx).await?;

        tx.commit().await?;

        decode_rows(collection, &rows)
    }

    /// Records whose indexed attribute equals `value`, in key order
    pub async fn query_by_index<R: DeserializeOwned>(
        &self,
        collection: Collection,
        index_name: &str,
        value: impl Into<IndexValue>,
    ) -> Result<Vec<R>> {
        let index = collection
            .index(index_name)
            .ok_or_else(|| invalid(collection, format!("no index named {}", index_name)))?;

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"SELECT id, value FROM "{}" WHERE {} = ? ORDER BY id"#,
            collection.table(),
            index.expression()
        );
        let value: IndexValue = value.into();
        let rows = value
            .bind(sqlx::query(&sql))
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        decode_rows(collection, &rows)
    }

    /// Delete a record. Deleting an absent key is not an error.
    pub async fn delete(&self, collection: Collection, key: impl Into<Key>) -> Result<()> {
        let key = key.into();
        key.check_kind(collection)?;

        let mut tx = self.pool.begin().await?;

        let sql = format!(r#"DELETE FROM "{}" WHERE id = ?"#, collection.table());
        let rows = key.bind(sqlx::query(&sql)).execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        tracing::debug!("Deleted {} record {} ({} rows)", collection, key, rows);
        Ok(())
    }

    /// Remove every record of a collection. Generated keys are not reused.
    pub async fn clear(&self, collection: Collection) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(r#"DELETE FROM "{}""#, collection.table());
        let rows = sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();

        tx.commit().await?;

        tracing::debug!("Cleared {} ({} records)", collection, rows);
        Ok(())
    }

    /// Number of records in a collection
    pub async fn count(&self, collection: Collection) -> Result<u64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, collection.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

/// A writer that claimed the key between our check and our insert still
/// counts as a duplicate, not a storage failure.
fn insert_error(err: sqlx::Error, collection: Collection, key: &Key) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::DuplicateKey {
            collection,
            key: key.to_string(),
        },
        other => other.into(),
    }
}

async fn key_exists(conn: &mut SqliteConnection, collection: Collection, key: &Key) -> Result<bool> {
    let sql = format!(r#"SELECT 1 FROM "{}" WHERE id = ?"#, collection.table());
    let found = key.bind(sqlx::query(&sql)).fetch_optional(&mut *conn).await?;
    Ok(found.is_some())
}

async fn insert_generated(conn: &mut SqliteConnection, collection: Collection, body: String) -> Result<Key> {
    if collection.key_kind() != KeyKind::AutoIncrement {
        return Err(invalid(collection, "record has no key".to_string()));
    }

    let sql = format!(r#"INSERT INTO "{}" (value) VALUES (?) RETURNING id"#, collection.table());
    let id: i64 = sqlx::query_scalar(&sql).bind(body).fetch_one(&mut *conn).await?;
    Ok(Key::Int(id))
}

/// Split a record into its key and the JSON body stored for it.
fn encode_record<R: Serialize>(collection: Collection, record: &R) -> Result<(Option<Key>, String)> {
    let mut value = serde_json::to_value(record)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| invalid(collection, "record is not an object".to_string()))?;

    let key = match object.remove(KEY_PATH) {
        Some(raw) => Key::from_json(collection, &raw)?,
        None => None,
    };

    Ok((key, serde_json::to_string(&value)?))
}

fn decode_record<R: DeserializeOwned>(key: Key, body: &str) -> Result<R> {
    let mut value: Value = serde_json::from_str(body)?;
    if let Some(object) = value.as_object_mut() {
        object.insert(KEY_PATH.to_string(), key.to_json());
    }
    Ok(serde_json::from_value(value)?)
}

fn decode_rows<R: DeserializeOwned>(collection: Collection, rows: &[SqliteRow]) -> Result<Vec<R>> {
    rows.iter()
        .map(|row| {
            let key = match collection.key_kind() {
                KeyKind::AutoIncrement => Key::Int(row.try_get("id")?),
                KeyKind::Fixed => Key::Text(row.try_get("id")?),
            };
            let body: String = row.try_get("value")?;
            decode_record(key, &body)
        })
        .collect()
}

fn invalid(collection: Collection, reason: String) -> AppError {
    AppError::InvalidRecord { collection, reason }
}

fn unavailable(err: AppError) -> AppError {
    match err {
        AppError::StorageUnavailable(_) => err,
        other => AppError::StorageUnavailable(other.to_string()),
    }
}
