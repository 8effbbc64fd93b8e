use serde::{Deserialize, Deserializer};

use crate::models::{RemoteFood, RemoteNutrition};

/// Body of the search-a-licious `/search` endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<ProductData>,
}

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    pub status: i32,
    pub product: Option<ProductData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductData {
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_brands")]
    pub brands: Option<String>,
    pub code: Option<String>,
    pub nutriments: Option<Nutriments>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Nutriments {
    #[serde(rename = "energy-kcal_100g", default, deserialize_with = "lenient_f64")]
    pub energy_kcal_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub proteins_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbohydrates_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fiber_100g: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sugars_100g: Option<f64>,
    /// Grams per 100 g upstream.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sodium_100g: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(f64),
    Text(String),
    Other(serde_json::Value),
}

// Upstream sometimes sends numbers as strings.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<NumOrText> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(NumOrText::Num(n)) => Some(n),
        Some(NumOrText::Text(s)) => s.trim().parse::<f64>().ok(),
        Some(NumOrText::Other(_)) | None => None,
    }
    .filter(|v| v.is_finite()))
}

// Search hits carry brands as an array, product lookups as a comma string.
fn lenient_brands<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Array(items)) => {
            let names: Vec<&str> = items.iter().filter_map(serde_json::Value::as_str).collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Map an upstream product to a [`RemoteFood`]. Products without a name are dropped.
#[must_use]
pub fn product_to_remote(p: ProductData) -> Option<RemoteFood> {
    let name = non_empty(p.product_name)?;
    let nutrition = p.nutriments.map(|n| RemoteNutrition {
        calories: n.energy_kcal_100g,
        protein_g: n.proteins_100g,
        carbs_g: n.carbohydrates_100g,
        fat_g: n.fat_100g,
        fiber_g: n.fiber_100g,
        sugar_g: n.sugars_100g,
        sodium_mg: n.sodium_100g.map(|g| g * 1000.0),
    });

    Some(RemoteFood {
        name,
        brand: non_empty(p.brands),
        barcode: non_empty(p.code),
        nutrition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_product() -> ProductData {
        ProductData {
            product_name: Some("Nutella".to_string()),
            brands: Some("Ferrero".to_string()),
            code: Some("3017624010701".to_string()),
            nutriments: Some(Nutriments {
                energy_kcal_100g: Some(539.0),
                proteins_100g: Some(6.3),
                carbohydrates_100g: Some(57.5),
                fat_100g: Some(30.9),
                fiber_100g: None,
                sugars_100g: Some(56.3),
                sodium_100g: Some(0.0428),
            }),
        }
    }

    #[test]
    fn test_product_to_remote_complete() {
        let food = product_to_remote(full_product()).unwrap();
        assert_eq!(food.name, "Nutella");
        assert_eq!(food.brand.as_deref(), Some("Ferrero"));
        assert_eq!(food.barcode.as_deref(), Some("3017624010701"));
        let n = food.nutrition.unwrap();
        assert_eq!(n.calories, Some(539.0));
        assert_eq!(n.sugar_g, Some(56.3));
        assert!((n.sodium_mg.unwrap() - 42.8).abs() < 1e-9);
        assert!(n.fiber_g.is_none());
    }

    #[test]
    fn test_product_to_remote_missing_name() {
        let mut p = full_product();
        p.product_name = None;
        assert!(product_to_remote(p).is_none());

        let mut p2 = full_product();
        p2.product_name = Some("   ".to_string());
        assert!(product_to_remote(p2).is_none());
    }

    #[test]
    fn test_product_without_nutriments_is_kept() {
        let mut p = full_product();
        p.nutriments = None;
        let food = product_to_remote(p).unwrap();
        assert!(food.nutrition.is_none());
        assert!(food.usable_nutrition().is_none());
    }

    #[test]
    fn test_parse_search_hits() {
        let body = r#"{
            "hits": [
                {"code": "5449000000996", "product_name": "Coca-Cola", "brands": ["Coca-Cola"],
                 "nutriments": {"energy-kcal_100g": 42, "sugars_100g": "10.6", "sodium_100g": 0}},
                {"code": "123", "product_name": "", "brands": []},
                {"code": "456", "product_name": "Mystery", "nutriments": {"energy-kcal_100g": "n/a"}}
            ],
            "count": 3
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let foods: Vec<RemoteFood> = parsed.hits.into_iter().filter_map(product_to_remote).collect();
        assert_eq!(foods.len(), 2);
        assert_eq!(foods[0].brand.as_deref(), Some("Coca-Cola"));
        let n = foods[0].nutrition.unwrap();
        assert_eq!(n.calories, Some(42.0));
        assert_eq!(n.sugar_g, Some(10.6));
        assert_eq!(n.sodium_mg, Some(0.0));
        assert!(foods[1].usable_nutrition().is_none());
    }

    #[test]
    fn test_parse_product_response() {
        let body = r#"{"status": 1, "code": "3017624010701",
            "product": {"code": "3017624010701", "product_name": "Nutella", "brands": "Ferrero",
                        "nutriments": {"energy-kcal_100g": 539, "proteins_100g": 6.3, "fat_100g": null}}}"#;
        let parsed: ProductResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, 1);
        let food = product_to_remote(parsed.product.unwrap()).unwrap();
        let facts = food.usable_nutrition().unwrap();
        assert_eq!(facts.calories, 539.0);
        assert_eq!(facts.fat_g, 0.0);

        let missing: ProductResponse =
            serde_json::from_str(r#"{"status": 0, "status_verbose": "product not found"}"#).unwrap();
        assert_eq!(missing.status, 0);
        assert!(missing.product.is_none());
    }
}
