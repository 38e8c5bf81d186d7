//! Record transformation
//!
//! Maps one [`ExternalFoodRecord`] to a [`CanonicalIngredient`]. Everything
//! here is pure: the sync timestamp is passed in and nothing touches the
//! network or the disk.

use super::categories::{food_group, resolve_category, FoodGroup};
use super::models::ExternalFoodRecord;
use super::nutrients;
use chrono::{DateTime, Utc};
use pantry_common::types::{
    CanonicalIngredient, DietaryFlag, NutrientProfile, DATA_SOURCE_USDA,
};
use std::collections::BTreeSet;

/// Longest name stored, in characters
pub const MAX_NAME_CHARS: usize = 500;

/// Tags kept per ingredient
pub const MAX_TAGS: usize = 10;

const ELLIPSIS: &str = "...";

const DAIRY_TERMS: &[&str] = &[
    "dairy", "cheese", "whey", "casein", "yogurt", "lactose", "buttermilk", "milkfat",
];
/// Dairy words that also name plant products ("peanut butter", "oat milk")
const QUALIFIED_DAIRY_WORDS: &[&str] = &["milk", "butter", "cream"];
const PLANT_QUALIFIERS: &[&str] = &[
    "peanut", "nut", "cocoa", "cacao", "shea", "apple", "almond", "cashew", "coconut", "oat",
    "soy", "rice", "hazelnut", "sunflower", "seed", "pea",
];
const GLUTEN_TERMS: &[&str] = &["wheat", "gluten", "barley", "rye", "semolina", "spelt"];
const SOY_TERMS: &[&str] = &["soy"];
const EGG_WORDS: &[&str] = &["egg", "eggs", "albumin", "albumen"];

/// Transform a record, stamping it with the current time
pub fn transform(record: &ExternalFoodRecord) -> CanonicalIngredient {
    transform_at(record, Utc::now())
}

/// Transform a record with an explicit sync timestamp
pub fn transform_at(record: &ExternalFoodRecord, synced_at: DateTime<Utc>) -> CanonicalIngredient {
    let data_type = clean(record.data_type.as_deref()).unwrap_or_default().to_string();
    let label = clean(record.food_category.as_deref());
    let category = resolve_category(label, &data_type);
    let brand_owner = clean(record.brand_owner.as_deref()).map(str::to_string);

    let name = truncate_name(record.description.trim());
    let nutrients = extract_nutrients(record);
    let dietary_flags = infer_flags(record, &data_type, &category);
    let tags = build_tags(record, &data_type, label.map(|_| category.as_str()), brand_owner.as_deref());
    let search_text = build_search_text(record, &name, &category, &tags);

    CanonicalIngredient {
        fdc_id: record.fdc_id,
        name,
        category,
        data_type,
        brand_owner,
        search_text,
        tags,
        dietary_flags,
        data_source: DATA_SOURCE_USDA.to_string(),
        synced_at,
        nutrients,
    }
}

fn clean(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Cut a name to [`MAX_NAME_CHARS`] characters, ending in `...` when cut
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }
    let keep = MAX_NAME_CHARS - ELLIPSIS.len();
    let mut truncated: String = name.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

/// First valid value per field wins, in record order
fn extract_nutrients(record: &ExternalFoodRecord) -> NutrientProfile {
    let mut profile = NutrientProfile::default();
    for entry in &record.food_nutrients {
        let (Some(field), Some(value)) = (nutrients::field_for(entry), entry.value) else {
            continue;
        };
        profile.set_if_absent(field, value);
    }
    profile
}

fn infer_flags(record: &ExternalFoodRecord, data_type: &str, category: &str) -> BTreeSet<DietaryFlag> {
    let mut flags = BTreeSet::new();

    if matches!(data_type, "Foundation" | "SR Legacy") {
        match food_group(category) {
            FoodGroup::Vegetables | FoodGroup::Fruits => {
                flags.extend([DietaryFlag::Vegan, DietaryFlag::Vegetarian, DietaryFlag::GlutenFree]);
            },
            FoodGroup::Legumes => {
                flags.extend([
                    DietaryFlag::Vegan,
                    DietaryFlag::Vegetarian,
                    DietaryFlag::GlutenFree,
                    DietaryFlag::HighProtein,
                ]);
            },
            FoodGroup::NutsAndSeeds => {
                flags.extend([
                    DietaryFlag::Vegan,
                    DietaryFlag::Vegetarian,
                    DietaryFlag::GlutenFree,
                    DietaryFlag::HighFat,
                ]);
            },
            FoodGroup::DairyAndEggs => {
                flags.extend([DietaryFlag::Vegetarian, DietaryFlag::GlutenFree]);
            },
            FoodGroup::Other => {},
        }
    }

    if let Some(ingredients) = clean(record.ingredients.as_deref()) {
        let text = ingredients.to_lowercase();
        if contains_dairy(&text) {
            flags.insert(DietaryFlag::ContainsDairy);
        }
        if GLUTEN_TERMS.iter().any(|term| text.contains(term)) {
            flags.insert(DietaryFlag::ContainsGluten);
        }
        if SOY_TERMS.iter().any(|term| text.contains(term)) {
            flags.insert(DietaryFlag::ContainsSoy);
        }
        if words(&text).any(|word| EGG_WORDS.contains(&word)) {
            flags.insert(DietaryFlag::ContainsEgg);
        }
    }

    flags
}

/// Dairy check over lower-cased ingredient text
fn contains_dairy(text: &str) -> bool {
    if DAIRY_TERMS.iter().any(|term| text.contains(term)) {
        return true;
    }
    let tokens: Vec<&str> = words(text).collect();
    tokens.iter().enumerate().any(|(i, word)| {
        if !QUALIFIED_DAIRY_WORDS.contains(word) {
            return false;
        }
        let plant = i > 0 && PLANT_QUALIFIERS.contains(&tokens[i - 1]);
        let tartar = *word == "cream" && tokens.get(i + 2) == Some(&"tartar");
        !plant && !tartar
    })
}

fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty())
}

/// Lower-case, hyphen-separated form of a label ("Survey (FNDDS)" → "survey-fndds")
pub fn slugify(value: &str) -> String {
    words(&value.to_lowercase()).collect::<Vec<_>>().join("-")
}

fn build_tags(
    record: &ExternalFoodRecord,
    data_type: &str,
    category: Option<&str>,
    brand_owner: Option<&str>,
) -> Vec<String> {
    let mut candidates = vec![slugify(data_type)];
    if let Some(category) = category {
        candidates.push(slugify(category));
    }
    if let Some(brand) = brand_owner {
        candidates.push("branded".to_string());
        candidates.push(slugify(brand));
    }
    if let Some(scientific) = clean(record.scientific_name.as_deref()) {
        candidates.extend(scientific.split_whitespace().map(str::to_lowercase));
    }

    let mut tags: Vec<String> = Vec::with_capacity(MAX_TAGS);
    for tag in candidates {
        if tags.len() == MAX_TAGS {
            break;
        }
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn build_search_text(
    record: &ExternalFoodRecord,
    name: &str,
    category: &str,
    tags: &[String],
) -> String {
    let parts = [
        Some(name),
        Some(category),
        clean(record.brand_owner.as_deref()),
        clean(record.brand_name.as_deref()),
        clean(record.scientific_name.as_deref()),
        clean(record.additional_descriptions.as_deref()),
    ];

    parts
        .into_iter()
        .flatten()
        .chain(tags.iter().map(String::as_str))
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
