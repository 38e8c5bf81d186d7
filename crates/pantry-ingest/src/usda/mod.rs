//! USDA FoodData Central source
//!
//! - [`client`]: rate-limited HTTP access to `foods/search`
//! - [`models`]: wire types of the search response
//! - [`transform`]: mapping to [`pantry_common::types::CanonicalIngredient`]

pub mod categories;
pub mod client;
pub mod models;
pub mod nutrients;
pub mod transform;

pub use client::{FoodPage, FoodSource, RateLimitedClient};
pub use models::{ExternalFoodRecord, FoodNutrient, FoodSearchResponse};
pub use transform::{transform, transform_at};
