//! Pantry ingredient ingestion
//!
//! Pages through USDA FoodData Central, normalizes each food into a
//! [`CanonicalIngredient`](pantry_common::types::CanonicalIngredient) and
//! upserts the results into the ingredient store, checkpointing after every
//! page so an interrupted run picks up where it stopped.
//!
//! # Components
//!
//! - [`usda`]: rate-limited client, wire models and the record transformer
//! - [`writer`]: batch buffering over an [`writer::IngredientStore`]
//! - [`storage`]: the Postgres ingredient store
//! - [`orchestrator`]: the resumable pagination loop
//! - [`monitor`] / [`status`]: read-only views of the checkpoint
//!
//! # Example
//!
//! ```no_run
//! use pantry_ingest::config::IngestConfig;
//! use pantry_ingest::orchestrator::IngestionOrchestrator;
//! use pantry_ingest::usda::RateLimitedClient;
//! use pantry_ingest::writer::MemoryIngredientStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?.with_data_types(["Foundation"]);
//!     let client = RateLimitedClient::new(&config)?;
//!     let mut orchestrator = IngestionOrchestrator::new(
//!         config,
//!         client,
//!         MemoryIngredientStore::new(),
//!         CancellationToken::new(),
//!     );
//!     let summary = orchestrator.run(false).await?;
//!     println!("processed {}", summary.checkpoint.processed_items);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod monitor;
pub mod orchestrator;
pub mod progress;
pub mod shutdown;
pub mod status;
pub mod storage;
pub mod usda;
pub mod writer;

pub use error::{FetchError, IngestError, Result, StoreError};
