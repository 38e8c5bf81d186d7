//! Domain types shared by the ingestion run and its observers

pub mod checkpoint;
pub mod ingredient;

pub use checkpoint::{IngestionCheckpoint, RunStatus, MAX_CHECKPOINT_ERRORS};
pub use ingredient::{CanonicalIngredient, DietaryFlag, NutrientField, NutrientProfile, DATA_SOURCE_USDA};
