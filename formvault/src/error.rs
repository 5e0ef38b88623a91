//! Error types for FormVault
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for the outer presentation layer.

use crate::database::Collection;
use crate::validation::Violation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Duplicate key {key} in {collection}")]
    DuplicateKey { collection: Collection, key: String },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("Validation failed: {}", describe_violations(.0))]
    ValidationFailed(Vec<Violation>),

    #[error("Import failed at {collection}[{index}]: {source}")]
    ImportFailed {
        collection: Collection,
        index: usize,
        #[source]
        source: Box<AppError>,
    },

    #[error("Invalid record for {collection}: {reason}")]
    InvalidRecord {
        collection: Collection,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not a snapshot document: {0}")]
    InvalidSnapshot(String),
}

impl AppError {
    pub fn not_found(what: &'static str, key: impl ToString) -> Self {
        AppError::NotFound {
            what,
            key: key.to_string(),
        }
    }

    /// Whether the user can fix the input and retry.
    ///
    /// Storage failures are fatal: the user has to reload or check storage
    /// permissions. An import failure inherits the nature of its cause.
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::ValidationFailed(_) | AppError::NotFound { .. } => true,
            AppError::ImportFailed { source, .. } => source.is_recoverable(),
            AppError::InvalidRecord { .. } | AppError::DuplicateKey { .. } => true,
            AppError::InvalidSnapshot(_) => true,
            _ => false,
        }
    }

    /// Violations carried by this error, looking through import failures.
    pub fn violations(&self) -> &[Violation] {
        match self {
            AppError::ValidationFailed(violations) => violations,
            AppError::ImportFailed { source, .. } => source.violations(),
            _ => &[],
        }
    }
}

fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
