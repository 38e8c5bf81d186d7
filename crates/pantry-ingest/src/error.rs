//! Error types for the ingestion pipeline
//!
//! Each layer has its own enum. The orchestrator folds them into
//! [`IngestError`], which is the only error the CLI ever sees.

use pantry_common::PantryError;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure talking to the reference API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Worth retrying later: rate limiting, server errors, network trouble
    #[error("Transient fetch failure{}: {message}", status_suffix(.status))]
    Transient { message: String, status: Option<u16> },

    /// Retrying will not help: bad request, bad key, undecodable body
    #[error("Fatal fetch failure{}: {message}", status_suffix(.status))]
    Fatal { message: String, status: Option<u16> },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl FetchError {
    pub fn transient(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Transient {
            message: message.into(),
            status,
        }
    }

    pub fn fatal(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Fatal {
            message: message.into(),
            status,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Batch-level failure of the ingredient store.
///
/// Per-record failures are not errors; they come back as
/// [`crate::writer::UpsertOutcome::Failed`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Top-level error of an ingestion run
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Ingredient store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint failure: {0}")]
    Checkpoint(#[from] PantryError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        Self::Aborted(msg.into())
    }
}
