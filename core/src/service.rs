use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::{Duration, Local, NaiveDate};

use crate::db::Database;
use crate::error::{LookupError, RemoteError};
use crate::models::{
    ClearSummary, ConsumedNutrition, DailyNutritionSummary, DiaryEntry, FoodRecord, FoodResult,
    FoodSearchResponse, FoodWithNutrition, ImportReport, LogMeal, MealType, NewDiaryEntry,
    NewFoodRecord, NewNutritionFacts, NutritionFacts, NutritionTotals, PortionNutrition,
    Provenance, RemoteFood, round2, validate_barcode, validate_new_food, validate_nutrition,
    validate_quantity, validate_search_query,
};
use crate::rate_limit::{ApiCategory, RateLimiter, RateLimits};
use crate::seed::{COMMON_FOODS, QUICK_START_BARCODES};

const POPULAR_LIMIT: usize = 20;

/// Source of remote food data.
///
/// Called synchronously; async callers should run service methods on a
/// blocking thread. Implementations perform exactly one upstream request per
/// call and never retry.
pub trait FoodLookupProvider: Send + Sync {
    /// Free-text search for at most `limit` products.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<RemoteFood>, RemoteError>;
    /// `Ok(None)` when the upstream has no product for `barcode`.
    fn lookup_barcode(&self, barcode: &str) -> Result<Option<RemoteFood>, RemoteError>;
}

fn invalid(err: anyhow::Error) -> LookupError {
    LookupError::InvalidInput(err.to_string())
}

fn food_not_found(id: i64) -> LookupError {
    LookupError::NotFound(format!("Food with id {id} not found"))
}

pub struct NutritionService {
    db: Mutex<Database>,
    limiter: RateLimiter,
}

impl NutritionService {
    pub fn new(db_path: &Path, limits: RateLimits) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self::with_database(db, RateLimiter::new(limits)))
    }

    pub fn new_in_memory(limits: RateLimits) -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self::with_database(db, RateLimiter::new(limits)))
    }

    #[must_use]
    pub fn with_database(db: Database, limiter: RateLimiter) -> Self {
        Self {
            db: Mutex::new(db),
            limiter,
        }
    }

    // Never held across a remote call or a throttle wait.
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    // --- Orchestrated lookups ---

    /// Local matches first; the remote API is consulted only for the shortfall.
    pub fn search_foods(
        &self,
        provider: &dyn FoodLookupProvider,
        query: &str,
        limit: usize,
    ) -> Result<FoodSearchResponse, LookupError> {
        let query = validate_search_query(query, limit).map_err(invalid)?;

        let local = self.db().search_foods_local(query, limit)?;
        let mut foods: Vec<FoodResult> = local
            .into_iter()
            .map(|f| FoodResult::stored(f.food, f.nutrition.as_ref(), Provenance::Local))
            .collect();
        let local_results = foods.len();
        let mut cached_new = 0;

        if local_results < limit {
            let shortfall = limit - local_results;
            self.limiter.acquire(ApiCategory::Search);
            match provider.search(query, shortfall) {
                Ok(hits) => {
                    let local_barcodes: HashSet<String> =
                        foods.iter().filter_map(|f| f.barcode.clone()).collect();
                    let fresh = hits.into_iter().filter(|hit| {
                        hit.barcode
                            .as_ref()
                            .is_none_or(|code| !local_barcodes.contains(code))
                    });
                    for hit in fresh.take(shortfall) {
                        let result = self.cache_search_hit(hit)?;
                        if result.source == Provenance::AutoCached {
                            cached_new += 1;
                        }
                        foods.push(result);
                    }
                }
                Err(err) => {
                    tracing::warn!(query, error = %err, "remote search failed, returning local results only");
                }
            }
        }

        Ok(FoodSearchResponse {
            query: query.to_string(),
            total_results: foods.len(),
            local_results,
            cached_new,
            foods,
        })
    }

    // Persist a search hit when it has calories and an untaken barcode.
    // Barcode-less hits are never stored.
    fn cache_search_hit(&self, hit: RemoteFood) -> Result<FoodResult, LookupError> {
        let (Some(facts), Some(barcode)) = (hit.usable_nutrition(), hit.barcode.clone()) else {
            return Ok(FoodResult::remote(hit));
        };
        let db = self.db();
        if db.food_exists_by_barcode(&barcode)? {
            return Ok(FoodResult::remote(hit));
        }
        let record = NewFoodRecord {
            name: hit.name.clone(),
            brand: hit.brand.clone(),
            barcode: Some(barcode),
        };
        match db.insert_food_if_absent(&record, Some(&facts))? {
            Some(stored) => {
                tracing::info!(food_id = stored.food.id, name = %stored.food.name, "auto-cached search result");
                Ok(FoodResult::stored(
                    stored.food,
                    stored.nutrition.as_ref(),
                    Provenance::AutoCached,
                ))
            }
            None => Ok(FoodResult::remote(hit)),
        }
    }

    /// Exact local lookup, falling back to one remote product request.
    pub fn get_by_barcode(
        &self,
        provider: &dyn FoodLookupProvider,
        barcode: &str,
    ) -> Result<FoodResult, LookupError> {
        let barcode = validate_barcode(barcode).map_err(invalid)?;

        if let Some(local) = self.db().get_food_with_nutrition_by_barcode(barcode)? {
            return Ok(FoodResult::stored(
                local.food,
                local.nutrition.as_ref(),
                Provenance::Local,
            ));
        }

        self.limiter.acquire(ApiCategory::Product);
        let remote = provider.lookup_barcode(barcode)?.ok_or_else(|| {
            LookupError::NotFound(format!("No product found for barcode '{barcode}'"))
        })?;

        let Some(facts) = remote.usable_nutrition() else {
            return Ok(FoodResult::remote(remote));
        };

        let db = self.db();
        let record = NewFoodRecord {
            name: remote.name.clone(),
            brand: remote.brand.clone(),
            barcode: Some(barcode.to_string()),
        };
        if let Some(stored) = db.insert_food_if_absent(&record, Some(&facts))? {
            tracing::info!(food_id = stored.food.id, barcode, "auto-cached barcode lookup");
            return Ok(FoodResult::stored(
                stored.food,
                stored.nutrition.as_ref(),
                Provenance::AutoCached,
            ));
        }

        // Another request cached the same barcode while we were fetching.
        match db.get_food_with_nutrition_by_barcode(barcode)? {
            Some(existing) => Ok(FoodResult::stored(
                existing.food,
                existing.nutrition.as_ref(),
                Provenance::Local,
            )),
            None => Ok(FoodResult::remote(remote)),
        }
    }

    /// Fetch a product and persist it, replacing nutrition for an existing barcode.
    pub fn cache_from_remote(
        &self,
        provider: &dyn FoodLookupProvider,
        barcode: &str,
    ) -> Result<FoodResult, LookupError> {
        let barcode = validate_barcode(barcode).map_err(invalid)?;

        self.limiter.acquire(ApiCategory::Product);
        let remote = provider.lookup_barcode(barcode)?.ok_or_else(|| {
            LookupError::NotFound(format!("No product found for barcode '{barcode}'"))
        })?;
        let facts = remote.usable_nutrition().ok_or_else(|| {
            LookupError::NoNutrition(format!("Product '{barcode}' has no calorie data"))
        })?;

        let db = self.db();
        let record = NewFoodRecord {
            name: remote.name,
            brand: remote.brand,
            barcode: Some(barcode.to_string()),
        };
        if let Some(stored) = db.insert_food_if_absent(&record, Some(&facts))? {
            return Ok(FoodResult::stored(
                stored.food,
                stored.nutrition.as_ref(),
                Provenance::AutoCached,
            ));
        }
        let existing = db
            .get_food_by_barcode(barcode)?
            .ok_or_else(|| LookupError::NotFound(format!("Food with barcode '{barcode}' vanished")))?;
        let nutrition = db.upsert_nutrition(existing.id, &facts)?;
        Ok(FoodResult::stored(
            existing,
            Some(&nutrition),
            Provenance::AutoCached,
        ))
    }

    // --- Catalogue ---

    pub fn create_food(
        &self,
        food: &NewFoodRecord,
        nutrition: Option<&NewNutritionFacts>,
    ) -> Result<FoodWithNutrition, LookupError> {
        let food = validate_new_food(food).map_err(invalid)?;
        if let Some(n) = nutrition {
            validate_nutrition(n).map_err(invalid)?;
        }
        self.db()
            .insert_food_if_absent(&food, nutrition)?
            .ok_or_else(|| {
                LookupError::InvalidInput(format!(
                    "A food with barcode '{}' already exists",
                    food.barcode.as_deref().unwrap_or_default()
                ))
            })
    }

    pub fn get_food(&self, id: i64) -> Result<FoodRecord, LookupError> {
        self.db().get_food_by_id(id)?.ok_or_else(|| food_not_found(id))
    }

    pub fn get_food_complete(&self, id: i64) -> Result<FoodWithNutrition, LookupError> {
        self.db()
            .get_food_with_nutrition(id)?
            .ok_or_else(|| food_not_found(id))
    }

    pub fn list_foods(&self) -> Result<Vec<FoodWithNutrition>> {
        self.db().list_foods(None)
    }

    pub fn popular_foods(&self) -> Result<Vec<FoodWithNutrition>> {
        self.db().list_foods(Some(POPULAR_LIMIT))
    }

    pub fn save_nutrition(
        &self,
        food_id: i64,
        nutrition: &NewNutritionFacts,
    ) -> Result<NutritionFacts, LookupError> {
        validate_nutrition(nutrition).map_err(invalid)?;
        let db = self.db();
        if db.get_food_by_id(food_id)?.is_none() {
            return Err(food_not_found(food_id));
        }
        let replaced = db.nutrition_exists(food_id)?;
        let saved = db.upsert_nutrition(food_id, nutrition)?;
        tracing::info!(food_id, replaced, "saved nutrition");
        Ok(saved)
    }

    pub fn get_nutrition(&self, food_id: i64) -> Result<NutritionFacts, LookupError> {
        let db = self.db();
        if db.get_food_by_id(food_id)?.is_none() {
            return Err(food_not_found(food_id));
        }
        db.get_nutrition(food_id)?.ok_or_else(|| {
            LookupError::NoNutrition(format!("No nutrition data for food {food_id}"))
        })
    }

    pub fn calculate_nutrition(
        &self,
        food_id: i64,
        grams: f64,
    ) -> Result<PortionNutrition, LookupError> {
        if !grams.is_finite() || grams <= 0.0 {
            return Err(LookupError::InvalidInput("grams must be positive".to_string()));
        }
        let food = self.get_food_complete(food_id)?;
        let facts = food.nutrition.as_ref().ok_or_else(|| {
            LookupError::NoNutrition(format!("No nutrition data for food {food_id}"))
        })?;
        Ok(PortionNutrition {
            food_id,
            food_name: food.food.name,
            grams,
            nutrition: NewNutritionFacts::from(facts).scaled(grams),
        })
    }

    pub fn clear_all(&self) -> Result<ClearSummary> {
        let summary = self.db().clear_foods()?;
        tracing::info!(
            foods = summary.foods_deleted,
            nutrition = summary.nutrition_deleted,
            "cleared food catalogue"
        );
        Ok(summary)
    }

    // --- Imports ---

    /// Seed the built-in common foods. Barcodes already present are skipped.
    pub fn import_common_foods(&self) -> Result<ImportReport> {
        let db = self.db();
        let mut report = ImportReport::default();
        for seed in COMMON_FOODS {
            if db
                .insert_food_if_absent(&seed.record(), Some(&seed.nutrition()))?
                .is_some()
            {
                report.imported += 1;
            } else {
                report.skipped += 1;
            }
        }
        tracing::info!(
            imported = report.imported,
            skipped = report.skipped,
            total = db.count_foods()?,
            "imported common foods"
        );
        Ok(report)
    }

    /// Cache a fixed set of popular products from the remote API.
    pub fn import_quick_start(&self, provider: &dyn FoodLookupProvider) -> Result<ImportReport> {
        let mut report = ImportReport::default();
        for barcode in QUICK_START_BARCODES {
            if self.db().food_exists_by_barcode(barcode)? {
                report.skipped += 1;
                continue;
            }
            match self.cache_from_remote(provider, barcode) {
                Ok(_) => report.imported += 1,
                Err(LookupError::Store(err)) => return Err(err),
                Err(err) => {
                    tracing::warn!(barcode, error = %err, "quick-start import failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    // --- Meal diary ---

    pub fn log_meal(&self, req: &LogMeal) -> Result<DiaryEntry, LookupError> {
        if req.user_id <= 0 {
            return Err(LookupError::InvalidInput("user_id must be positive".to_string()));
        }
        validate_quantity(req.quantity_grams).map_err(invalid)?;

        let db = self.db();
        let food = db
            .get_food_with_nutrition(req.food_id)?
            .ok_or_else(|| food_not_found(req.food_id))?;
        let facts = food.nutrition.as_ref().map(NewNutritionFacts::from);
        let notes = req
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(db.insert_diary_entry(&NewDiaryEntry {
            user_id: req.user_id,
            food_id: req.food_id,
            quantity_grams: req.quantity_grams,
            meal_type: req.meal_type,
            date: req.date.unwrap_or_else(|| Local::now().date_naive()),
            notes,
            consumed: ConsumedNutrition::for_portion(facts.as_ref(), req.quantity_grams),
        })?)
    }

    pub fn meals_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<DiaryEntry>> {
        self.db().get_diary_entries_for_date(user_id, date)
    }

    pub fn meals_for_type(
        &self,
        user_id: i64,
        date: NaiveDate,
        meal_type: MealType,
    ) -> Result<Vec<DiaryEntry>> {
        self.db().get_diary_entries_for_meal(user_id, date, meal_type)
    }

    /// Seven days starting at `start`, which defaults to a week ago.
    pub fn meals_for_week(
        &self,
        user_id: i64,
        start: Option<NaiveDate>,
    ) -> Result<Vec<DiaryEntry>> {
        let start = start.unwrap_or_else(|| Local::now().date_naive() - Duration::days(7));
        let end = start + Duration::days(6);
        self.db().get_diary_entries_between(user_id, start, end)
    }

    pub fn daily_summary(&self, user_id: i64, date: NaiveDate) -> Result<DailyNutritionSummary> {
        let db = self.db();
        let (t, entry_count) = db.diary_totals(user_id, date)?;
        let meals = db.diary_meal_counts(user_id, date)?;
        Ok(DailyNutritionSummary {
            user_id,
            date,
            totals: NutritionTotals {
                calories: round2(t.calories),
                protein_g: round2(t.protein_g),
                carbs_g: round2(t.carbs_g),
                fat_g: round2(t.fat_g),
                fiber_g: round2(t.fiber_g),
                sugar_g: round2(t.sugar_g),
                sodium_mg: round2(t.sodium_mg),
            },
            entry_count,
            meals,
        })
    }

    pub fn delete_meal(&self, entry_id: i64, user_id: i64) -> Result<bool> {
        self.db().delete_diary_entry(entry_id, user_id)
    }
}
