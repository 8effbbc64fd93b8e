use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// --- Foods ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodRecord {
    pub id: i64,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFoodRecord {
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
}

/// Per-100 g nutrition facts for a single food. At most one row per food.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub id: i64,
    pub food_id: i64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NewNutritionFacts {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
}

impl NewNutritionFacts {
    /// Scale per-100 g values to `grams`. Linear and unrounded.
    #[must_use]
    pub fn scaled(&self, grams: f64) -> Self {
        let s = |v: f64| v * grams / 100.0;
        Self {
            calories: s(self.calories),
            protein_g: s(self.protein_g),
            carbs_g: s(self.carbs_g),
            fat_g: s(self.fat_g),
            fiber_g: self.fiber_g.map(s),
            sugar_g: self.sugar_g.map(s),
            sodium_mg: self.sodium_mg.map(s),
        }
    }
}

impl From<&NutritionFacts> for NewNutritionFacts {
    fn from(n: &NutritionFacts) -> Self {
        Self {
            calories: n.calories,
            protein_g: n.protein_g,
            carbs_g: n.carbs_g,
            fat_g: n.fat_g,
            fiber_g: n.fiber_g,
            sugar_g: n.sugar_g,
            sodium_mg: n.sodium_mg,
        }
    }
}

/// A food together with its nutrition, if any is known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodWithNutrition {
    #[serde(flatten)]
    pub food: FoodRecord,
    pub nutrition: Option<NutritionFacts>,
    pub has_nutrition: bool,
}

impl FoodWithNutrition {
    #[must_use]
    pub fn new(food: FoodRecord, nutrition: Option<NutritionFacts>) -> Self {
        let has_nutrition = nutrition.is_some();
        Self {
            food,
            nutrition,
            has_nutrition,
        }
    }
}

/// Nutrition computed for a portion of a food.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortionNutrition {
    pub food_id: i64,
    pub food_name: String,
    pub grams: f64,
    #[serde(flatten)]
    pub nutrition: NewNutritionFacts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClearSummary {
    pub foods_deleted: usize,
    pub nutrition_deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

// --- Lookup results ---

/// Where a lookup result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Already in the local store before this request.
    Local,
    /// Fetched remotely and persisted by this request.
    AutoCached,
    /// Fetched remotely and not persisted.
    Api,
}

impl Provenance {
    #[must_use]
    pub fn available_offline(self) -> bool {
        !matches!(self, Self::Api)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::AutoCached => "auto-cached",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodResult {
    /// `None` for results that were never persisted.
    pub id: Option<i64>,
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub nutrition: Option<NewNutritionFacts>,
    pub has_nutrition: bool,
    pub source: Provenance,
    pub available_offline: bool,
}

impl FoodResult {
    #[must_use]
    pub fn stored(
        food: FoodRecord,
        nutrition: Option<&NutritionFacts>,
        source: Provenance,
    ) -> Self {
        let nutrition = nutrition.map(NewNutritionFacts::from);
        Self {
            id: Some(food.id),
            name: food.name,
            brand: food.brand,
            barcode: food.barcode,
            has_nutrition: nutrition.is_some(),
            nutrition,
            source,
            available_offline: source.available_offline(),
        }
    }

    #[must_use]
    pub fn remote(food: RemoteFood) -> Self {
        let nutrition = food.nutrition.and_then(RemoteNutrition::to_facts);
        Self {
            id: None,
            name: food.name,
            brand: food.brand,
            barcode: food.barcode,
            has_nutrition: nutrition.is_some(),
            nutrition,
            source: Provenance::Api,
            available_offline: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodSearchResponse {
    pub query: String,
    pub total_results: usize,
    pub local_results: usize,
    pub cached_new: usize,
    pub foods: Vec<FoodResult>,
}

/// A product as parsed from the remote API, before it touches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFood {
    pub name: String,
    pub brand: Option<String>,
    pub barcode: Option<String>,
    pub nutrition: Option<RemoteNutrition>,
}

/// Remote per-100 g values. Every field may be missing upstream; sodium is in mg.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RemoteNutrition {
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
}

impl RemoteNutrition {
    /// Usable facts require a calorie value; missing macros are stored as zero.
    #[must_use]
    pub fn to_facts(self) -> Option<NewNutritionFacts> {
        Some(NewNutritionFacts {
            calories: self.calories?,
            protein_g: self.protein_g.unwrap_or(0.0),
            carbs_g: self.carbs_g.unwrap_or(0.0),
            fat_g: self.fat_g.unwrap_or(0.0),
            fiber_g: self.fiber_g,
            sugar_g: self.sugar_g,
            sodium_mg: self.sodium_mg,
        })
    }
}

impl RemoteFood {
    #[must_use]
    pub fn usable_nutrition(&self) -> Option<NewNutritionFacts> {
        self.nutrition.and_then(RemoteNutrition::to_facts)
    }
}

// --- Closed string enums ---

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        let valid: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                        anyhow::anyhow!(
                            "Invalid {} '{s}'. Must be one of: {}",
                            stringify!($name),
                            valid.join(", ")
                        )
                    })
            }
        }
    };
}

string_enum!(
    MealType {
        Breakfast => "BREAKFAST",
        Lunch => "LUNCH",
        Dinner => "DINNER",
        Snack => "SNACK",
        Other => "OTHER",
    }
);

string_enum!(
    Gender {
        Male => "MALE",
        Female => "FEMALE",
        Other => "OTHER",
        PreferNotToSay => "PREFER_NOT_TO_SAY",
    }
);

string_enum!(
    ActivityLevel {
        Sedentary => "SEDENTARY",
        LightlyActive => "LIGHTLY_ACTIVE",
        ModeratelyActive => "MODERATELY_ACTIVE",
        VeryActive => "VERY_ACTIVE",
        ExtremelyActive => "EXTREMELY_ACTIVE",
    }
);

string_enum!(
    FitnessGoal {
        LoseWeight => "LOSE_WEIGHT",
        GainWeight => "GAIN_WEIGHT",
        MaintainWeight => "MAINTAIN_WEIGHT",
        BuildMuscle => "BUILD_MUSCLE",
        ImproveEndurance => "IMPROVE_ENDURANCE",
        GeneralFitness => "GENERAL_FITNESS",
        StrengthTraining => "STRENGTH_TRAINING",
    }
);

string_enum!(
    Units {
        Metric => "METRIC",
        Imperial => "IMPERIAL",
    }
);

// --- Meal diary ---

/// Consumed amounts for one diary entry. All `None` when the food had no nutrition.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConsumedNutrition {
    pub calories: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
}

impl ConsumedNutrition {
    /// Scale per-100 g facts to `grams`, rounded to two decimals.
    #[must_use]
    pub fn for_portion(facts: Option<&NewNutritionFacts>, grams: f64) -> Self {
        let Some(facts) = facts else {
            return Self::default();
        };
        let portion = facts.scaled(grams);
        Self {
            calories: Some(round2(portion.calories)),
            protein_g: Some(round2(portion.protein_g)),
            carbs_g: Some(round2(portion.carbs_g)),
            fat_g: Some(round2(portion.fat_g)),
            fiber_g: portion.fiber_g.map(round2),
            sugar_g: portion.sugar_g.map(round2),
            sodium_mg: portion.sodium_mg.map(round2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiaryEntry {
    pub id: i64,
    pub user_id: i64,
    pub food_id: i64,
    pub food_name: String,
    pub food_brand: Option<String>,
    pub quantity_grams: f64,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub consumed: ConsumedNutrition,
    pub logged_at: String,
}

/// A meal log request. `date` defaults to today.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogMeal {
    pub user_id: i64,
    pub food_id: i64,
    pub quantity_grams: f64,
    pub meal_type: MealType,
    pub date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDiaryEntry {
    pub user_id: i64,
    pub food_id: i64,
    pub quantity_grams: f64,
    pub meal_type: MealType,
    pub date: NaiveDate,
    pub notes: Option<String>,
    pub consumed: ConsumedNutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealCount {
    pub meal_type: MealType,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyNutritionSummary {
    pub user_id: i64,
    pub date: NaiveDate,
    pub totals: NutritionTotals,
    pub entry_count: i64,
    pub meals: Vec<MealCount>,
}

// --- Accounts ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub current_weight_kg: Option<f64>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
    pub fitness_goal: Option<FitnessGoal>,
    pub target_weight_kg: Option<f64>,
    pub daily_calories_goal: Option<i64>,
    pub daily_protein_goal: Option<f64>,
    pub daily_carbs_goal: Option<f64>,
    pub daily_fat_goal: Option<f64>,
    pub daily_water_goal: Option<f64>,
    pub weekly_workout_goal: Option<i64>,
    pub preferred_units: Units,
    pub timezone: Option<String>,
    pub is_verified: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Profile fields accepted at registration and on update. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub height_cm: Option<f64>,
    pub current_weight_kg: Option<f64>,
    pub gender: Option<String>,
    pub activity_level: Option<String>,
    pub fitness_goal: Option<String>,
    pub target_weight_kg: Option<f64>,
    pub daily_calories_goal: Option<i64>,
    pub daily_protein_goal: Option<f64>,
    pub daily_carbs_goal: Option<f64>,
    pub daily_fat_goal: Option<f64>,
    pub daily_water_goal: Option<f64>,
    pub weekly_workout_goal: Option<i64>,
    pub preferred_units: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessSummary {
    pub user_id: i64,
    pub username: String,
    pub age: Option<i32>,
    pub bmi: f64,
    pub bmi_category: &'static str,
    pub current_weight_kg: Option<f64>,
    pub target_weight_kg: Option<f64>,
    pub weight_difference_kg: Option<f64>,
    pub fitness_goal: Option<FitnessGoal>,
    pub activity_level: Option<ActivityLevel>,
    pub daily_calories_goal: Option<i64>,
    pub weekly_workout_goal: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileOptions {
    pub genders: Vec<&'static str>,
    pub activity_levels: Vec<&'static str>,
    pub fitness_goals: Vec<&'static str>,
    pub units: Vec<&'static str>,
}

impl ProfileOptions {
    #[must_use]
    pub fn all() -> Self {
        Self {
            genders: Gender::ALL.iter().map(|v| v.as_str()).collect(),
            activity_levels: ActivityLevel::ALL.iter().map(|v| v.as_str()).collect(),
            fitness_goals: FitnessGoal::ALL.iter().map(|v| v.as_str()).collect(),
            units: Units::ALL.iter().map(|v| v.as_str()).collect(),
        }
    }
}

// --- Derived metrics ---

/// BMI from height in cm and weight in kg, rounded to two decimals. Zero when either is unknown.
#[must_use]
pub fn bmi(height_cm: Option<f64>, weight_kg: Option<f64>) -> f64 {
    match (height_cm, weight_kg) {
        (Some(h), Some(w)) if h > 0.0 && w > 0.0 => {
            let m = h / 100.0;
            round2(w / (m * m))
        }
        _ => 0.0,
    }
}

#[must_use]
pub fn bmi_category(bmi: f64) -> &'static str {
    if bmi <= 0.0 {
        "Unknown"
    } else if bmi < 18.5 {
        "Underweight"
    } else if bmi < 25.0 {
        "Normal weight"
    } else if bmi < 30.0 {
        "Overweight"
    } else {
        "Obese"
    }
}

/// Age as the difference in calendar years.
#[must_use]
pub fn age_in_years(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    use chrono::Datelike;
    today.year() - date_of_birth.year()
}

/// Round half away from zero to two decimals.
#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// --- Validation ---

pub const MIN_QUERY_CHARS: usize = 2;

/// Returns the trimmed query when it is long enough and `limit` is positive.
pub fn validate_search_query(query: &str, limit: usize) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.chars().count() < MIN_QUERY_CHARS {
        bail!("Search query must be at least {MIN_QUERY_CHARS} characters");
    }
    if limit == 0 {
        bail!("limit must be positive");
    }
    Ok(trimmed)
}

pub fn validate_barcode(barcode: &str) -> Result<&str> {
    let trimmed = barcode.trim();
    if trimmed.is_empty() {
        bail!("barcode must not be empty");
    }
    if trimmed.len() > 64 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("Invalid barcode '{trimmed}'");
    }
    Ok(trimmed)
}

pub fn validate_new_food(food: &NewFoodRecord) -> Result<NewFoodRecord> {
    let name = food.name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 500 {
        bail!("name must be at most 500 characters");
    }
    let barcode = match food.barcode.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(b) => Some(validate_barcode(b)?.to_string()),
    };
    Ok(NewFoodRecord {
        name: name.to_string(),
        brand: food
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string),
        barcode,
    })
}

pub fn validate_nutrition(n: &NewNutritionFacts) -> Result<()> {
    for (label, value) in [
        ("calories", Some(n.calories)),
        ("protein_g", Some(n.protein_g)),
        ("carbs_g", Some(n.carbs_g)),
        ("fat_g", Some(n.fat_g)),
        ("fiber_g", n.fiber_g),
        ("sugar_g", n.sugar_g),
        ("sodium_mg", n.sodium_mg),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                bail!("{label} must be a non-negative number");
            }
        }
    }
    Ok(())
}

pub fn validate_quantity(grams: f64) -> Result<()> {
    if !grams.is_finite() || grams <= 0.0 {
        bail!("quantity_grams must be positive");
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(2..=100).contains(&len) {
        bail!("username must be between 2 and 100 characters");
    }
    Ok(username.to_string())
}

pub fn validate_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        bail!("email must not be empty");
    }
    if email.len() > 150 {
        bail!("email must be at most 150 characters");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => bail!("Invalid email '{email}'"),
    }
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        bail!("password must be at least 6 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_is_linear() {
        let facts = NewNutritionFacts {
            calories: 52.0,
            protein_g: 0.3,
            carbs_g: 13.8,
            fat_g: 0.2,
            fiber_g: Some(2.4),
            sugar_g: None,
            sodium_mg: Some(1.0),
        };
        for grams in [1.0, 33.3, 75.0, 150.0, 1234.5] {
            let one = facts.scaled(grams);
            let two = facts.scaled(2.0 * grams);
            assert_eq!(two.calories, 2.0 * one.calories);
            assert_eq!(two.protein_g, 2.0 * one.protein_g);
            assert_eq!(two.fiber_g.unwrap(), 2.0 * one.fiber_g.unwrap());
            assert!(two.sugar_g.is_none());
        }
        assert_eq!(facts.scaled(100.0).calories, 52.0);
        assert_eq!(facts.scaled(200.0).calories, 104.0);
    }

    #[test]
    fn test_consumed_nutrition_rounds_to_two_decimals() {
        let facts = NewNutritionFacts {
            calories: 89.0,
            protein_g: 1.1,
            carbs_g: 22.8,
            fat_g: 0.3,
            ..Default::default()
        };
        let consumed = ConsumedNutrition::for_portion(Some(&facts), 118.0);
        assert_eq!(consumed.calories, Some(105.02));
        assert_eq!(consumed.protein_g, Some(1.3));
        assert_eq!(consumed.carbs_g, Some(26.9));
        assert_eq!(consumed.fat_g, Some(0.35));
        assert!(consumed.fiber_g.is_none());

        let none = ConsumedNutrition::for_portion(None, 118.0);
        assert_eq!(none, ConsumedNutrition::default());
    }

    #[test]
    fn test_validate_search_query() {
        assert_eq!(validate_search_query("  app ", 5).unwrap(), "app");
        assert!(validate_search_query("a", 5).is_err());
        assert!(validate_search_query("   a   ", 5).is_err());
        assert!(validate_search_query("", 5).is_err());
        assert!(validate_search_query("apple", 0).is_err());
        // multi-byte characters count once
        assert!(validate_search_query("éé", 1).is_ok());
    }

    #[test]
    fn test_provenance_serialization() {
        assert_eq!(
            serde_json::to_string(&Provenance::AutoCached).unwrap(),
            "\"auto-cached\""
        );
        assert_eq!(serde_json::to_string(&Provenance::Local).unwrap(), "\"local\"");
        assert!(Provenance::Local.available_offline());
        assert!(Provenance::AutoCached.available_offline());
        assert!(!Provenance::Api.available_offline());
    }

    #[test]
    fn test_remote_nutrition_requires_calories() {
        let n = RemoteNutrition {
            calories: None,
            protein_g: Some(3.0),
            ..Default::default()
        };
        assert!(n.to_facts().is_none());

        let n = RemoteNutrition {
            calories: Some(120.0),
            ..Default::default()
        };
        let facts = n.to_facts().unwrap();
        assert_eq!(facts.calories, 120.0);
        assert_eq!(facts.protein_g, 0.0);
        assert!(facts.sodium_mg.is_none());
    }

    #[test]
    fn test_string_enums_parse_case_insensitively() {
        assert_eq!("breakfast".parse::<MealType>().unwrap(), MealType::Breakfast);
        assert_eq!(" Snack ".parse::<MealType>().unwrap(), MealType::Snack);
        assert!("brunch".parse::<MealType>().is_err());
        assert_eq!(
            "prefer_not_to_say".parse::<Gender>().unwrap(),
            Gender::PreferNotToSay
        );
        assert_eq!(
            serde_json::to_string(&ActivityLevel::VeryActive).unwrap(),
            "\"VERY_ACTIVE\""
        );
        assert_eq!(FitnessGoal::ALL.len(), 7);
    }

    #[test]
    fn test_bmi_and_category() {
        assert_eq!(bmi(Some(180.0), Some(81.0)), 25.0);
        assert_eq!(bmi_category(25.0), "Overweight");
        assert_eq!(bmi_category(24.99), "Normal weight");
        assert_eq!(bmi_category(18.4), "Underweight");
        assert_eq!(bmi_category(30.0), "Obese");
        assert_eq!(bmi(None, Some(80.0)), 0.0);
        assert_eq!(bmi_category(0.0), "Unknown");
    }

    #[test]
    fn test_age_in_years() {
        let dob = NaiveDate::from_ymd_opt(1990, 12, 31).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(age_in_years(dob, today), 34);
    }

    #[test]
    fn test_validate_new_food() {
        let food = validate_new_food(&NewFoodRecord {
            name: "  Oats ".to_string(),
            brand: Some("   ".to_string()),
            barcode: Some(String::new()),
        })
        .unwrap();
        assert_eq!(food.name, "Oats");
        assert!(food.brand.is_none());
        assert!(food.barcode.is_none());

        assert!(validate_new_food(&NewFoodRecord::default()).is_err());
        assert!(
            validate_new_food(&NewFoodRecord {
                name: "Oats".to_string(),
                brand: None,
                barcode: Some("12 34".to_string()),
            })
            .is_err()
        );
    }

    #[test]
    fn test_validate_account_fields() {
        assert_eq!(validate_email(" Ann@Example.com ").unwrap(), "ann@example.com");
        assert!(validate_email("nope").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_username("a").is_err());
        assert_eq!(validate_username(" ann ").unwrap(), "ann");
        assert!(validate_password("12345").is_err());
        assert!(validate_quantity(0.0).is_err());
        assert!(validate_quantity(f64::NAN).is_err());
        assert!(validate_quantity(10.0).is_ok());
    }
}
