//! Built-in food data used to bootstrap an empty catalogue.

use crate::models::{NewFoodRecord, NewNutritionFacts};

pub struct SeedFood {
    pub name: &'static str,
    pub brand: &'static str,
    pub barcode: &'static str,
    /// calories, protein, carbs, fat, fiber, sugar (g) and sodium (mg), per 100 g.
    pub per_100g: [f64; 7],
}

impl SeedFood {
    #[must_use]
    pub fn record(&self) -> NewFoodRecord {
        NewFoodRecord {
            name: self.name.to_string(),
            brand: Some(self.brand.to_string()),
            barcode: Some(self.barcode.to_string()),
        }
    }

    #[must_use]
    pub fn nutrition(&self) -> NewNutritionFacts {
        let [calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg] = self.per_100g;
        NewNutritionFacts {
            calories,
            protein_g,
            carbs_g,
            fat_g,
            fiber_g: Some(fiber_g),
            sugar_g: Some(sugar_g),
            sodium_mg: Some(sodium_mg),
        }
    }
}

const fn seed(name: &'static str, brand: &'static str, barcode: &'static str, per_100g: [f64; 7]) -> SeedFood {
    SeedFood {
        name,
        brand,
        barcode,
        per_100g,
    }
}

/// Common whole foods. Produce uses PLU codes, everything else a short internal code.
pub const COMMON_FOODS: &[SeedFood] = &[
    // Fruits
    seed("Apple", "Fresh", "4131", [52.0, 0.3, 13.8, 0.2, 2.4, 10.4, 1.0]),
    seed("Banana", "Fresh", "4011", [89.0, 1.1, 22.8, 0.3, 2.6, 12.2, 1.0]),
    seed("Orange", "Fresh", "3107", [47.0, 0.9, 11.8, 0.1, 2.4, 9.4, 0.0]),
    seed("Strawberries", "Fresh", "4323", [32.0, 0.7, 7.7, 0.3, 2.0, 4.9, 1.0]),
    seed("Grapes", "Fresh", "4023", [62.0, 0.6, 16.0, 0.2, 0.9, 16.0, 2.0]),
    // Vegetables
    seed("Broccoli", "Fresh", "4060", [34.0, 2.8, 7.0, 0.4, 2.6, 1.5, 33.0]),
    seed("Spinach", "Fresh", "4090", [23.0, 2.9, 3.6, 0.4, 2.2, 0.4, 79.0]),
    seed("Carrots", "Fresh", "4094", [41.0, 0.9, 9.6, 0.2, 2.8, 4.7, 69.0]),
    seed("Tomatoes", "Fresh", "4799", [18.0, 0.9, 3.9, 0.2, 1.2, 2.6, 5.0]),
    seed("Bell Pepper", "Fresh", "4688", [31.0, 1.0, 7.3, 0.3, 2.5, 4.2, 4.0]),
    // Proteins, cooked
    seed("Chicken Breast", "Fresh", "0001", [165.0, 31.0, 0.0, 3.6, 0.0, 0.0, 74.0]),
    seed("Salmon", "Fresh", "0002", [208.0, 25.4, 0.0, 12.4, 0.0, 0.0, 59.0]),
    seed("Ground Beef", "85% Lean", "0003", [250.0, 26.0, 0.0, 15.0, 0.0, 0.0, 75.0]),
    seed("Eggs", "Large", "0004", [155.0, 13.0, 1.1, 11.0, 0.0, 0.0, 124.0]),
    seed("Tuna", "Canned in Water", "0005", [116.0, 25.5, 0.0, 0.8, 0.0, 0.0, 247.0]),
    // Grains, cooked
    seed("Brown Rice", "Cooked", "0010", [123.0, 2.6, 23.0, 0.9, 1.8, 0.4, 5.0]),
    seed("Quinoa", "Cooked", "0011", [120.0, 4.4, 21.3, 1.9, 2.8, 0.9, 7.0]),
    seed("Oats", "Cooked", "0012", [68.0, 2.4, 12.0, 1.4, 1.7, 0.3, 49.0]),
    seed("Whole Wheat Bread", "Slice", "0013", [247.0, 13.0, 41.0, 4.2, 7.0, 6.0, 681.0]),
    // Dairy
    seed("Greek Yogurt", "Plain", "0020", [59.0, 10.0, 3.6, 0.4, 0.0, 3.6, 36.0]),
    seed("Milk", "2%", "0021", [50.0, 3.3, 4.8, 2.0, 0.0, 4.8, 44.0]),
    seed("Cheddar Cheese", "Sharp", "0022", [403.0, 25.0, 1.3, 33.0, 0.0, 0.5, 621.0]),
    // Nuts and seeds
    seed("Almonds", "Raw", "0030", [579.0, 21.0, 22.0, 50.0, 12.0, 4.4, 1.0]),
    seed("Peanut Butter", "Natural", "0031", [588.0, 25.0, 20.0, 50.0, 8.0, 9.2, 17.0]),
    seed("Chia Seeds", "Organic", "0032", [486.0, 17.0, 42.0, 31.0, 34.0, 0.0, 16.0]),
    // Legumes, cooked
    seed("Black Beans", "Cooked", "0040", [132.0, 8.9, 23.0, 0.5, 8.7, 0.3, 2.0]),
    seed("Lentils", "Cooked", "0041", [116.0, 9.0, 20.0, 0.4, 7.9, 1.8, 2.0]),
    seed("Chickpeas", "Cooked", "0042", [164.0, 8.9, 27.0, 2.6, 8.0, 2.0, 7.0]),
];

/// Widely scanned products fetched by the quick-start import.
pub const QUICK_START_BARCODES: &[&str] = &[
    "3017624010701", // Nutella
    "5449000000996", // Coca-Cola
    "7622210951502",
    "8712566441235",
    "4902102072373",
    "8714100770269",
    "3229820129488",
    "3033710065967",
    "8076800195057",
    "5000159407236",
];
