//! Nutrient code table
//!
//! Search results identify nutrients by FDC nutrient id and, for most
//! entries, by the legacy SR nutrient number as well. Both are mapped here.

use super::models::FoodNutrient;
use pantry_common::types::NutrientField;

/// FDC nutrient id → canonical field
const NUTRIENT_IDS: &[(u32, NutrientField)] = &[
    (1008, NutrientField::Calories), // Energy (kcal)
    (2047, NutrientField::Calories), // Energy (Atwater General Factors)
    (2048, NutrientField::Calories), // Energy (Atwater Specific Factors)
    (1003, NutrientField::Protein),
    (1005, NutrientField::Carbohydrates), // Carbohydrate, by difference
    (1050, NutrientField::Carbohydrates), // Carbohydrate, by summation
    (1004, NutrientField::Fat),
    (1085, NutrientField::Fat), // Total fat (NLEA)
    (1079, NutrientField::Fiber),
    (2000, NutrientField::Sugar), // Sugars, total including NLEA
    (1063, NutrientField::Sugar), // Sugars, Total
    (1093, NutrientField::Sodium),
    (1087, NutrientField::Calcium),
    (1089, NutrientField::Iron),
    (1162, NutrientField::VitaminC),
];

/// Legacy SR nutrient number → canonical field
const NUTRIENT_NUMBERS: &[(&str, NutrientField)] = &[
    ("208", NutrientField::Calories),
    ("957", NutrientField::Calories),
    ("958", NutrientField::Calories),
    ("203", NutrientField::Protein),
    ("205", NutrientField::Carbohydrates),
    ("204", NutrientField::Fat),
    ("291", NutrientField::Fiber),
    ("269", NutrientField::Sugar),
    ("307", NutrientField::Sodium),
    ("301", NutrientField::Calcium),
    ("303", NutrientField::Iron),
    ("401", NutrientField::VitaminC),
];

pub fn field_for_id(id: u32) -> Option<NutrientField> {
    NUTRIENT_IDS
        .iter()
        .find(|(code, _)| *code == id)
        .map(|(_, field)| *field)
}

pub fn field_for_number(number: &str) -> Option<NutrientField> {
    NUTRIENT_NUMBERS
        .iter()
        .find(|(code, _)| *code == number)
        .map(|(_, field)| *field)
}

/// Resolve the canonical field of a nutrient entry.
///
/// The nutrient id is authoritative; the legacy number is used only when the
/// id is missing or unknown. Energy reported in kJ never maps.
pub fn field_for(nutrient: &FoodNutrient) -> Option<NutrientField> {
    let field = nutrient
        .nutrient_id
        .and_then(field_for_id)
        .or_else(|| nutrient.nutrient_number.as_deref().and_then(field_for_number))?;

    if field == NutrientField::Calories && nutrient.is_kilojoules() {
        return None;
    }
    Some(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Option<u32>, number: Option<&str>, unit: &str) -> FoodNutrient {
        FoodNutrient {
            nutrient_id: id,
            nutrient_number: number.map(str::to_string),
            unit_name: Some(unit.to_string()),
            value: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_energy_codes() {
        for id in [1008, 2047, 2048] {
            assert_eq!(field_for_id(id), Some(NutrientField::Calories));
        }
        assert_eq!(field_for_number("208"), Some(NutrientField::Calories));
    }

    #[test]
    fn test_unknown_codes_are_dropped() {
        assert_eq!(field_for_id(1062), None);
        assert_eq!(field_for(&entry(Some(9999), Some("999"), "G")), None);
    }

    #[test]
    fn test_legacy_number_is_fallback() {
        assert_eq!(field_for(&entry(None, Some("401"), "MG")), Some(NutrientField::VitaminC));
        assert_eq!(field_for(&entry(Some(424242), Some("203"), "G")), Some(NutrientField::Protein));
    }

    #[test]
    fn test_kilojoule_energy_is_ignored() {
        assert_eq!(field_for(&entry(Some(1008), Some("208"), "kJ")), None);
        assert_eq!(field_for(&entry(Some(1008), Some("208"), "KCAL")), Some(NutrientField::Calories));
    }

    #[test]
    fn test_every_field_is_reachable() {
        for field in NutrientField::ALL {
            assert!(NUTRIENT_IDS.iter().any(|(_, f)| *f == field), "{:?} has no id", field);
            assert!(NUTRIENT_NUMBERS.iter().any(|(_, f)| *f == field), "{:?} has no number", field);
        }
    }
}
