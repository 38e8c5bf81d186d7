//! Pantry Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the Pantry ingestion tooling.
//!
//! # Overview
//!
//! This crate provides functionality used by both sides of the checkpoint
//! contract: the ingestion run that writes progress and the monitor that reads it.
//!
//! - **Error Handling**: Common error type and result alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Types**: Canonical ingredient shape and the ingestion checkpoint
//! - **Checkpoint**: Atomic, file-backed checkpoint persistence
//!
//! # Example
//!
//! ```no_run
//! use pantry_common::checkpoint::CheckpointStore;
//!
//! fn show_progress() -> pantry_common::Result<()> {
//!     let store = CheckpointStore::new("./data/ingest-checkpoint.json");
//!     if let Some(checkpoint) = store.load()? {
//!         println!("{}/{}", checkpoint.processed_items, checkpoint.total_items);
//!     }
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{PantryError, Result};
