//! Error types for Pantry

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Pantry operations
pub type Result<T> = std::result::Result<T, PantryError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum PantryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checkpoint file {path} could not be read: {source}")]
    CheckpointRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint file {path} could not be written: {source}")]
    CheckpointWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint file {path} is corrupt: {source}")]
    CorruptCheckpoint {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PantryError {
    /// Create an invalid checkpoint error
    pub fn invalid_checkpoint(msg: impl Into<String>) -> Self {
        Self::InvalidCheckpoint(msg.into())
    }

    /// Whether the error came from writing the checkpoint to disk
    pub fn is_persist_failure(&self) -> bool {
        matches!(self, Self::CheckpointWrite { .. } | Self::Serialization(_))
    }
}
