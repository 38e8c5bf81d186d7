//! Category normalization

/// FDC category label (lower-cased) → display category
const CATEGORY_TABLE: &[(&str, &str)] = &[
    ("vegetables and vegetable products", "Vegetables"),
    ("fruits and fruit juices", "Fruits"),
    ("legumes and legume products", "Legumes"),
    ("nut and seed products", "Nuts & Seeds"),
    ("dairy and egg products", "Dairy & Eggs"),
    ("beef products", "Meat"),
    ("pork products", "Meat"),
    ("lamb, veal, and game products", "Meat"),
    ("sausages and luncheon meats", "Meat"),
    ("poultry products", "Poultry"),
    ("finfish and shellfish products", "Seafood"),
    ("cereal grains and pasta", "Grains & Pasta"),
    ("breakfast cereals", "Breakfast Cereals"),
    ("baked products", "Baked Goods"),
    ("spices and herbs", "Spices & Herbs"),
    ("fats and oils", "Fats & Oils"),
    ("soups, sauces, and gravies", "Soups & Sauces"),
    ("sweets", "Sweets"),
    ("snacks", "Snacks"),
    ("beverages", "Beverages"),
    ("baby foods", "Baby Foods"),
    ("fast foods", "Prepared Meals"),
    ("restaurant foods", "Prepared Meals"),
    ("meals, entrees, and side dishes", "Prepared Meals"),
];

/// Category used when a record carries no label, keyed by data type
pub fn category_for_data_type(data_type: &str) -> &'static str {
    match data_type {
        "Foundation" => "Whole Foods",
        "SR Legacy" => "Reference Foods",
        "Survey (FNDDS)" => "Survey Foods",
        "Branded" => "Branded Foods",
        "Experimental" => "Experimental Foods",
        _ => "Uncategorized",
    }
}

/// Resolve the display category of a record.
///
/// A label found in the table maps to its display name, any other label is
/// kept verbatim (trimmed), and a missing or blank label falls back to the
/// data type.
pub fn resolve_category(label: Option<&str>, data_type: &str) -> String {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(label) => {
            let key = label.to_lowercase();
            CATEGORY_TABLE
                .iter()
                .find(|(raw, _)| *raw == key)
                .map(|(_, display)| display.to_string())
                .unwrap_or_else(|| label.to_string())
        },
        None => category_for_data_type(data_type).to_string(),
    }
}

/// Coarse food group used by the dietary-flag heuristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodGroup {
    Vegetables,
    Fruits,
    Legumes,
    NutsAndSeeds,
    DairyAndEggs,
    Other,
}

/// Classify a category (raw label or display name)
pub fn food_group(category: &str) -> FoodGroup {
    let c = category.to_lowercase();
    if c.contains("vegetable") {
        FoodGroup::Vegetables
    } else if c.contains("fruit") {
        FoodGroup::Fruits
    } else if c.contains("legume") {
        FoodGroup::Legumes
    } else if has_word(&c, &["nut", "nuts", "seed", "seeds"]) {
        FoodGroup::NutsAndSeeds
    } else if c.contains("dairy") || has_word(&c, &["egg", "eggs"]) {
        FoodGroup::DairyAndEggs
    } else {
        FoodGroup::Other
    }
}

/// Whole-word match, so "Nutrition Bars" is not a nut and "Eggplant" not an egg
fn has_word(c: &str, words: &[&str]) -> bool {
    c.split(|ch: char| !ch.is_alphanumeric())
        .any(|word| words.contains(&word))
}
