//! Canonical ingredient shape written to the ingredient store

use crate::error::PantryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Data-source label stamped on every ingredient ingested from FoodData Central
pub const DATA_SOURCE_USDA: &str = "usda_fdc";

/// Dietary flag attached to an ingredient.
///
/// Flags form a set; the ordering is only used to keep serialized output stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DietaryFlag {
    Vegan,
    Vegetarian,
    GlutenFree,
    HighProtein,
    HighFat,
    ContainsDairy,
    ContainsGluten,
    ContainsSoy,
    ContainsEgg,
}

impl DietaryFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            DietaryFlag::Vegan => "vegan",
            DietaryFlag::Vegetarian => "vegetarian",
            DietaryFlag::GlutenFree => "gluten-free",
            DietaryFlag::HighProtein => "high-protein",
            DietaryFlag::HighFat => "high-fat",
            DietaryFlag::ContainsDairy => "contains-dairy",
            DietaryFlag::ContainsGluten => "contains-gluten",
            DietaryFlag::ContainsSoy => "contains-soy",
            DietaryFlag::ContainsEgg => "contains-egg",
        }
    }
}

impl std::fmt::Display for DietaryFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DietaryFlag {
    type Err = PantryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vegan" => Ok(DietaryFlag::Vegan),
            "vegetarian" => Ok(DietaryFlag::Vegetarian),
            "gluten-free" => Ok(DietaryFlag::GlutenFree),
            "high-protein" => Ok(DietaryFlag::HighProtein),
            "high-fat" => Ok(DietaryFlag::HighFat),
            "contains-dairy" => Ok(DietaryFlag::ContainsDairy),
            "contains-gluten" => Ok(DietaryFlag::ContainsGluten),
            "contains-soy" => Ok(DietaryFlag::ContainsSoy),
            "contains-egg" => Ok(DietaryFlag::ContainsEgg),
            other => Err(PantryError::Parse(format!("Unknown dietary flag: {}", other))),
        }
    }
}

/// One of the ten per-100g nutrient columns of the ingredient store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientField {
    Calories,
    Protein,
    Carbohydrates,
    Fat,
    Fiber,
    Sugar,
    Sodium,
    Calcium,
    Iron,
    VitaminC,
}

impl NutrientField {
    pub const ALL: [NutrientField; 10] = [
        NutrientField::Calories,
        NutrientField::Protein,
        NutrientField::Carbohydrates,
        NutrientField::Fat,
        NutrientField::Fiber,
        NutrientField::Sugar,
        NutrientField::Sodium,
        NutrientField::Calcium,
        NutrientField::Iron,
        NutrientField::VitaminC,
    ];

    /// Column name in the `ingredients` table
    pub fn column(self) -> &'static str {
        match self {
            NutrientField::Calories => "calories_per_100g",
            NutrientField::Protein => "protein_g_per_100g",
            NutrientField::Carbohydrates => "carbs_g_per_100g",
            NutrientField::Fat => "fat_g_per_100g",
            NutrientField::Fiber => "fiber_g_per_100g",
            NutrientField::Sugar => "sugar_g_per_100g",
            NutrientField::Sodium => "sodium_mg_per_100g",
            NutrientField::Calcium => "calcium_mg_per_100g",
            NutrientField::Iron => "iron_mg_per_100g",
            NutrientField::VitaminC => "vitamin_c_mg_per_100g",
        }
    }
}

/// Nutrient values per 100 g.
///
/// A populated field is always finite and non-negative; `set_if_absent` is the
/// only way the transformer fills it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutrientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbohydrates_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium_mg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calcium_mg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iron_mg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vitamin_c_mg: Option<f64>,
}

impl NutrientProfile {
    fn slot(&mut self, field: NutrientField) -> &mut Option<f64> {
        match field {
            NutrientField::Calories => &mut self.calories,
            NutrientField::Protein => &mut self.protein_g,
            NutrientField::Carbohydrates => &mut self.carbohydrates_g,
            NutrientField::Fat => &mut self.fat_g,
            NutrientField::Fiber => &mut self.fiber_g,
            NutrientField::Sugar => &mut self.sugar_g,
            NutrientField::Sodium => &mut self.sodium_mg,
            NutrientField::Calcium => &mut self.calcium_mg,
            NutrientField::Iron => &mut self.iron_mg,
            NutrientField::VitaminC => &mut self.vitamin_c_mg,
        }
    }

    pub fn get(&self, field: NutrientField) -> Option<f64> {
        match field {
            NutrientField::Calories => self.calories,
            NutrientField::Protein => self.protein_g,
            NutrientField::Carbohydrates => self.carbohydrates_g,
            NutrientField::Fat => self.fat_g,
            NutrientField::Fiber => self.fiber_g,
            NutrientField::Sugar => self.sugar_g,
            NutrientField::Sodium => self.sodium_mg,
            NutrientField::Calcium => self.calcium_mg,
            NutrientField::Iron => self.iron_mg,
            NutrientField::VitaminC => self.vitamin_c_mg,
        }
    }

    /// Fill `field` unless it already holds a value.
    ///
    /// Returns `false` when the field was already set or the value is not a
    /// finite non-negative number.
    pub fn set_if_absent(&mut self, field: NutrientField, value: f64) -> bool {
        if !value.is_finite() || value < 0.0 {
            return false;
        }
        let slot = self.slot(field);
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Populated fields in column order
    pub fn populated(&self) -> impl Iterator<Item = (NutrientField, f64)> + '_ {
        NutrientField::ALL
            .into_iter()
            .filter_map(|field| self.get(field).map(|value| (field, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.populated().next().is_none()
    }
}

/// Normalized, store-ready representation of one external food record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIngredient {
    /// External identifier (FoodData Central `fdcId`), the upsert key
    pub fdc_id: i64,
    pub name: String,
    pub category: String,
    /// Source data-type classification ("Foundation", "Branded", ...)
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_owner: Option<String>,
    pub search_text: String,
    pub tags: Vec<String>,
    pub dietary_flags: BTreeSet<DietaryFlag>,
    pub data_source: String,
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub nutrients: NutrientProfile,
}

impl CanonicalIngredient {
    pub fn dietary_flag_names(&self) -> Vec<String> {
        self.dietary_flags.iter().map(|flag| flag.as_str().to_string()).collect()
    }
}
