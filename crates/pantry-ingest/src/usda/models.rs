//! Wire models for the FoodData Central `foods/search` endpoint
//!
//! Only the fields the transformer reads are modelled; everything else in
//! the response is ignored.

use serde::{Deserialize, Serialize};

/// One page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodSearchResponse {
    #[serde(default)]
    pub total_hits: u64,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub foods: Vec<ExternalFoodRecord>,
}

/// A food item as returned by the search endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalFoodRecord {
    pub fdc_id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub food_category: Option<String>,
    #[serde(default)]
    pub brand_owner: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub ingredients: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub additional_descriptions: Option<String>,
    #[serde(default)]
    pub food_nutrients: Vec<FoodNutrient>,
}

/// One nutrient entry of a search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodNutrient {
    #[serde(default)]
    pub nutrient_id: Option<u32>,
    /// Legacy SR nutrient number ("208"); usually a string, occasionally a number
    #[serde(default, deserialize_with = "de_nutrient_number")]
    pub nutrient_number: Option<String>,
    #[serde(default)]
    pub nutrient_name: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl FoodNutrient {
    /// Whether the value is reported in kilojoules
    pub fn is_kilojoules(&self) -> bool {
        self.unit_name
            .as_deref()
            .is_some_and(|unit| unit.eq_ignore_ascii_case("kj"))
    }
}

fn de_nutrient_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(u64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
            Some(format!("{}", f as u64))
        },
        Some(Raw::Float(_)) | None => None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_page() {
        let json = r#"{
            "totalHits": 5,
            "currentPage": 1,
            "totalPages": 3,
            "foodSearchCriteria": {"pageSize": 2},
            "foods": [{
                "fdcId": 2346404,
                "description": "Apples, raw",
                "dataType": "Foundation",
                "foodCategory": "Fruits and Fruit Juices",
                "publishedDate": "2024-04-18",
                "foodNutrients": [
                    {"nutrientId": 1008, "nutrientNumber": "208", "unitName": "KCAL", "value": 52.0},
                    {"nutrientId": 1062, "nutrientNumber": "268", "unitName": "kJ", "value": 218.0},
                    {"nutrientId": 1003, "unitName": "G"}
                ]
            }]
        }"#;

        let page: FoodSearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.total_hits, 5);
        assert_eq!(page.foods.len(), 1);

        let food = &page.foods[0];
        assert_eq!(food.fdc_id, 2346404);
        assert_eq!(food.food_category.as_deref(), Some("Fruits and Fruit Juices"));
        assert_eq!(food.food_nutrients[0].nutrient_number.as_deref(), Some("208"));
        assert!(food.food_nutrients[1].is_kilojoules());
        assert_eq!(food.food_nutrients[2].value, None);
    }

    #[test]
    fn test_numeric_nutrient_number_is_accepted() {
        let n: FoodNutrient =
            serde_json::from_str(r#"{"nutrientId": 1003, "nutrientNumber": 203, "value": 0.26}"#)
                .unwrap();
        assert_eq!(n.nutrient_number.as_deref(), Some("203"));
    }

    #[test]
    fn test_missing_foods_is_empty_page() {
        let page: FoodSearchResponse = serde_json::from_str(r#"{"totalHits": 0}"#).unwrap();
        assert!(page.foods.is_empty());
    }
}
