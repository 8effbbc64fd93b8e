use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::params;

use super::{Database, like_pattern};
use crate::models::{
    ClearSummary, FoodRecord, FoodWithNutrition, NewFoodRecord, NewNutritionFacts, NutritionFacts,
};

const FOOD_WITH_NUTRITION_SELECT: &str = "SELECT f.id, f.name, f.brand, f.barcode, f.created_at, f.updated_at,
        n.id, n.food_id, n.calories, n.protein_g, n.carbs_g, n.fat_g, n.fiber_g, n.sugar_g,
        n.sodium_mg, n.created_at, n.updated_at
 FROM foods f
 LEFT JOIN food_nutrition n ON n.food_id = f.id";

impl Database {
    // --- Row mapping helpers ---

    fn food_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodRecord> {
        Ok(FoodRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            brand: row.get(2)?,
            barcode: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn nutrition_from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<NutritionFacts> {
        Ok(NutritionFacts {
            id: row.get(offset)?,
            food_id: row.get(offset + 1)?,
            calories: row.get(offset + 2)?,
            protein_g: row.get(offset + 3)?,
            carbs_g: row.get(offset + 4)?,
            fat_g: row.get(offset + 5)?,
            fiber_g: row.get(offset + 6)?,
            sugar_g: row.get(offset + 7)?,
            sodium_mg: row.get(offset + 8)?,
            created_at: row.get(offset + 9)?,
            updated_at: row.get(offset + 10)?,
        })
    }

    // Expects FOOD_WITH_NUTRITION_SELECT columns: 0-5 food, 6-16 nutrition (NULL when absent).
    fn food_with_nutrition_from_row(row: &rusqlite::Row) -> rusqlite::Result<FoodWithNutrition> {
        let food = Self::food_from_row(row)?;
        let nutrition_id: Option<i64> = row.get(6)?;
        let nutrition = match nutrition_id {
            Some(_) => Some(Self::nutrition_from_row(row, 6)?),
            None => None,
        };
        Ok(FoodWithNutrition::new(food, nutrition))
    }

    // --- Foods ---

    #[cfg(test)]
    pub fn insert_food(&self, food: &NewFoodRecord) -> Result<FoodRecord> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO foods (name, brand, barcode, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![food.name, food.brand, food.barcode, now],
            )
            .with_context(|| format!("Failed to insert food '{}'", food.name))?;
        let id = self.conn.last_insert_rowid();
        self.get_food_by_id(id)?.context("Food vanished after insert")
    }

    /// Insert a food and its nutrition atomically.
    ///
    /// Returns `None` without writing anything when another row already holds
    /// the barcode. Foods without a barcode always insert.
    pub fn insert_food_if_absent(
        &self,
        food: &NewFoodRecord,
        nutrition: Option<&NewNutritionFacts>,
    ) -> Result<Option<FoodWithNutrition>> {
        let tx = self.conn.unchecked_transaction()?;
        let now = Local::now().to_rfc3339();
        let inserted = tx.execute(
            "INSERT INTO foods (name, brand, barcode, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(barcode) DO NOTHING",
            params![food.name, food.brand, food.barcode, now],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        let food_id = tx.last_insert_rowid();
        if let Some(n) = nutrition {
            tx.execute(
                "INSERT INTO food_nutrition
                    (food_id, calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    food_id,
                    n.calories,
                    n.protein_g,
                    n.carbs_g,
                    n.fat_g,
                    n.fiber_g,
                    n.sugar_g,
                    n.sodium_mg,
                    now,
                ],
            )?;
        }
        tx.commit()?;
        self.get_food_with_nutrition(food_id)
    }

    pub fn get_food_by_id(&self, id: i64) -> Result<Option<FoodRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, brand, barcode, created_at, updated_at FROM foods WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_food_by_barcode(&self, barcode: &str) -> Result<Option<FoodRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, brand, barcode, created_at, updated_at FROM foods WHERE barcode = ?1",
        )?;
        let mut rows = stmt.query(params![barcode])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn food_exists_by_barcode(&self, barcode: &str) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM foods WHERE barcode = ?1)",
            params![barcode],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn get_food_with_nutrition(&self, id: i64) -> Result<Option<FoodWithNutrition>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FOOD_WITH_NUTRITION_SELECT} WHERE f.id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_with_nutrition_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_food_with_nutrition_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Option<FoodWithNutrition>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FOOD_WITH_NUTRITION_SELECT} WHERE f.barcode = ?1"))?;
        let mut rows = stmt.query(params![barcode])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::food_with_nutrition_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Case-insensitive substring match on name or brand, ordered by name.
    pub fn search_foods_local(&self, query: &str, limit: usize) -> Result<Vec<FoodWithNutrition>> {
        let pattern = like_pattern(query);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "{FOOD_WITH_NUTRITION_SELECT}
             WHERE f.name LIKE ?1 ESCAPE '\\' OR f.brand LIKE ?1 ESCAPE '\\'
             ORDER BY f.name COLLATE NOCASE, f.id
             LIMIT ?2"
        ))?;
        let foods = stmt
            .query_map(params![pattern, limit], Self::food_with_nutrition_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn list_foods(&self, limit: Option<usize>) -> Result<Vec<FoodWithNutrition>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(&format!(
            "{FOOD_WITH_NUTRITION_SELECT} ORDER BY f.name COLLATE NOCASE, f.id LIMIT ?1"
        ))?;
        let foods = stmt
            .query_map(params![limit], Self::food_with_nutrition_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(foods)
    }

    pub fn count_foods(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM foods", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // --- Nutrition ---

    pub fn get_nutrition(&self, food_id: i64) -> Result<Option<NutritionFacts>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, food_id, calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg,
                    created_at, updated_at
             FROM food_nutrition WHERE food_id = ?1",
        )?;
        let mut rows = stmt.query(params![food_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::nutrition_from_row(row, 0)?))
        } else {
            Ok(None)
        }
    }

    pub fn nutrition_exists(&self, food_id: i64) -> Result<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM food_nutrition WHERE food_id = ?1)",
            params![food_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Create or replace in place the nutrition row for `food_id`.
    pub fn upsert_nutrition(
        &self,
        food_id: i64,
        n: &NewNutritionFacts,
    ) -> Result<NutritionFacts> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO food_nutrition
                (food_id, calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             ON CONFLICT(food_id) DO UPDATE SET
                calories = excluded.calories,
                protein_g = excluded.protein_g,
                carbs_g = excluded.carbs_g,
                fat_g = excluded.fat_g,
                fiber_g = excluded.fiber_g,
                sugar_g = excluded.sugar_g,
                sodium_mg = excluded.sodium_mg,
                updated_at = excluded.updated_at",
            params![
                food_id,
                n.calories,
                n.protein_g,
                n.carbs_g,
                n.fat_g,
                n.fiber_g,
                n.sugar_g,
                n.sodium_mg,
                now,
            ],
        )?;
        self.get_nutrition(food_id)?
            .context("Nutrition vanished after upsert")
    }

    /// Delete every nutrition row and every food row.
    pub fn clear_foods(&self) -> Result<ClearSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let nutrition_deleted = tx.execute("DELETE FROM food_nutrition", [])?;
        let foods_deleted = tx.execute("DELETE FROM foods", [])?;
        tx.commit()?;
        Ok(ClearSummary {
            foods_deleted,
            nutrition_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apple() -> NewFoodRecord {
        NewFoodRecord {
            name: "Apple".to_string(),
            brand: Some("Fresh".to_string()),
            barcode: Some("4011".to_string()),
        }
    }

    fn apple_facts() -> NewNutritionFacts {
        NewNutritionFacts {
            calories: 52.0,
            protein_g: 0.3,
            carbs_g: 13.8,
            fat_g: 0.2,
            fiber_g: Some(2.4),
            sugar_g: Some(10.4),
            sodium_mg: Some(1.0),
        }
    }

    #[test]
    fn test_insert_and_get_food() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(&apple()).unwrap();
        assert_eq!(food.name, "Apple");
        assert_eq!(food.barcode.as_deref(), Some("4011"));

        let fetched = db.get_food_by_id(food.id).unwrap().unwrap();
        assert_eq!(fetched, food);
        assert!(db.get_food_by_id(food.id + 100).unwrap().is_none());
        assert!(db.food_exists_by_barcode("4011").unwrap());
        assert!(!db.food_exists_by_barcode("4012").unwrap());
    }

    #[test]
    fn test_insert_if_absent_skips_duplicate_barcode() {
        let db = Database::open_in_memory().unwrap();
        let first = db
            .insert_food_if_absent(&apple(), Some(&apple_facts()))
            .unwrap()
            .unwrap();
        assert!(first.has_nutrition);
        assert_eq!(first.nutrition.as_ref().unwrap().calories, 52.0);

        let mut other = apple();
        other.name = "Imposter".to_string();
        let second = db.insert_food_if_absent(&other, None).unwrap();
        assert!(second.is_none());
        assert_eq!(db.count_foods().unwrap(), 1);
        let stored = db.get_food_by_barcode("4011").unwrap().unwrap();
        assert_eq!(stored.name, "Apple");
    }

    #[test]
    fn test_insert_if_absent_without_barcode_always_inserts() {
        let db = Database::open_in_memory().unwrap();
        let food = NewFoodRecord {
            name: "Toast".to_string(),
            brand: None,
            barcode: None,
        };
        assert!(db.insert_food_if_absent(&food, None).unwrap().is_some());
        assert!(db.insert_food_if_absent(&food, None).unwrap().is_some());
        assert_eq!(db.count_foods().unwrap(), 2);
    }

    #[test]
    fn test_search_foods_local() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food_if_absent(&apple(), Some(&apple_facts())).unwrap();
        db.insert_food(&NewFoodRecord {
            name: "Pineapple Chunks".to_string(),
            brand: None,
            barcode: None,
        })
        .unwrap();
        db.insert_food(&NewFoodRecord {
            name: "Bread".to_string(),
            brand: Some("Happy Bakery".to_string()),
            barcode: None,
        })
        .unwrap();

        let results = db.search_foods_local("APP", 10).unwrap();
        let names: Vec<&str> = results.iter().map(|f| f.food.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Bread", "Pineapple Chunks"]);
        assert!(results[0].has_nutrition);
        assert!(!results[2].has_nutrition);

        let limited = db.search_foods_local("app", 2).unwrap();
        assert_eq!(limited.len(), 2);

        assert!(db.search_foods_local("%", 10).unwrap().is_empty());
    }

    #[test]
    fn test_upsert_nutrition_updates_in_place() {
        let db = Database::open_in_memory().unwrap();
        let food = db.insert_food(&apple()).unwrap();
        assert!(!db.nutrition_exists(food.id).unwrap());

        let first = db.upsert_nutrition(food.id, &apple_facts()).unwrap();
        let mut changed = apple_facts();
        changed.calories = 60.0;
        changed.fiber_g = None;
        let second = db.upsert_nutrition(food.id, &changed).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.calories, 60.0);
        assert!(second.fiber_g.is_none());
        assert!(db.nutrition_exists(food.id).unwrap());
    }

    #[test]
    fn test_clear_foods() {
        let db = Database::open_in_memory().unwrap();
        db.insert_food_if_absent(&apple(), Some(&apple_facts())).unwrap();
        db.insert_food(&NewFoodRecord {
            name: "Water".to_string(),
            brand: None,
            barcode: None,
        })
        .unwrap();

        let summary = db.clear_foods().unwrap();
        assert_eq!(summary.foods_deleted, 2);
        assert_eq!(summary.nutrition_deleted, 1);
        assert_eq!(db.count_foods().unwrap(), 0);
        assert!(db.list_foods(None).unwrap().is_empty());
    }
}
