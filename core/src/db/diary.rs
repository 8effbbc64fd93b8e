use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::params;

use super::Database;
use crate::models::{
    ConsumedNutrition, DiaryEntry, MealCount, MealType, NewDiaryEntry, NutritionTotals,
};

const ENTRY_SELECT: &str = "SELECT e.id, e.user_id, e.food_id, f.name, f.brand, e.quantity_grams,
        e.meal_type, e.entry_date, e.notes, e.calories, e.protein_g, e.carbs_g, e.fat_g,
        e.fiber_g, e.sugar_g, e.sodium_mg, e.logged_at
 FROM food_diary_entries e
 JOIN foods f ON e.food_id = f.id";

fn date_str(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(idx: usize, err: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, err.into())
}

impl Database {
    // Expects ENTRY_SELECT columns.
    fn diary_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<DiaryEntry> {
        let meal_type: String = row.get(6)?;
        let meal_type = meal_type
            .parse::<MealType>()
            .map_err(|e| conversion_error(6, e))?;
        let date: String = row.get(7)?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| conversion_error(7, e.into()))?;
        Ok(DiaryEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            food_id: row.get(2)?,
            food_name: row.get(3)?,
            food_brand: row.get(4)?,
            quantity_grams: row.get(5)?,
            meal_type,
            date,
            notes: row.get(8)?,
            consumed: ConsumedNutrition {
                calories: row.get(9)?,
                protein_g: row.get(10)?,
                carbs_g: row.get(11)?,
                fat_g: row.get(12)?,
                fiber_g: row.get(13)?,
                sugar_g: row.get(14)?,
                sodium_mg: row.get(15)?,
            },
            logged_at: row.get(16)?,
        })
    }

    pub fn insert_diary_entry(&self, entry: &NewDiaryEntry) -> Result<DiaryEntry> {
        let now = Local::now().to_rfc3339();
        let c = &entry.consumed;
        self.conn.execute(
            "INSERT INTO food_diary_entries
                (user_id, food_id, quantity_grams, meal_type, entry_date, notes,
                 calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg, logged_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                entry.user_id,
                entry.food_id,
                entry.quantity_grams,
                entry.meal_type.as_str(),
                date_str(entry.date),
                entry.notes,
                c.calories,
                c.protein_g,
                c.carbs_g,
                c.fat_g,
                c.fiber_g,
                c.sugar_g,
                c.sodium_mg,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_diary_entry(id)?
            .context("Diary entry vanished after insert")
    }

    pub fn get_diary_entry(&self, id: i64) -> Result<Option<DiaryEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT} WHERE e.id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::diary_entry_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_diary_entries_for_date(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<DiaryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE e.user_id = ?1 AND e.entry_date = ?2
             ORDER BY e.logged_at, e.id"
        ))?;
        let entries = stmt
            .query_map(params![user_id, date_str(date)], Self::diary_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_diary_entries_for_meal(
        &self,
        user_id: i64,
        date: NaiveDate,
        meal_type: MealType,
    ) -> Result<Vec<DiaryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE e.user_id = ?1 AND e.entry_date = ?2 AND e.meal_type = ?3
             ORDER BY e.logged_at, e.id"
        ))?;
        let entries = stmt
            .query_map(
                params![user_id, date_str(date), meal_type.as_str()],
                Self::diary_entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries in `[start, end]`, newest date first.
    pub fn get_diary_entries_between(
        &self,
        user_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DiaryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE e.user_id = ?1 AND e.entry_date BETWEEN ?2 AND ?3
             ORDER BY e.entry_date DESC, e.logged_at DESC, e.id DESC"
        ))?;
        let entries = stmt
            .query_map(
                params![user_id, date_str(start), date_str(end)],
                Self::diary_entry_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // Totals and counts cover the same rows the listings return.
    pub fn diary_totals(&self, user_id: i64, date: NaiveDate) -> Result<(NutritionTotals, i64)> {
        let totals = self.conn.query_row(
            "SELECT COALESCE(SUM(e.calories), 0), COALESCE(SUM(e.protein_g), 0),
                    COALESCE(SUM(e.carbs_g), 0), COALESCE(SUM(e.fat_g), 0),
                    COALESCE(SUM(e.fiber_g), 0), COALESCE(SUM(e.sugar_g), 0),
                    COALESCE(SUM(e.sodium_mg), 0), COUNT(*)
             FROM food_diary_entries e
             JOIN foods f ON e.food_id = f.id
             WHERE e.user_id = ?1 AND e.entry_date = ?2",
            params![user_id, date_str(date)],
            |row| {
                Ok((
                    NutritionTotals {
                        calories: row.get(0)?,
                        protein_g: row.get(1)?,
                        carbs_g: row.get(2)?,
                        fat_g: row.get(3)?,
                        fiber_g: row.get(4)?,
                        sugar_g: row.get(5)?,
                        sodium_mg: row.get(6)?,
                    },
                    row.get(7)?,
                ))
            },
        )?;
        Ok(totals)
    }

    pub fn diary_meal_counts(&self, user_id: i64, date: NaiveDate) -> Result<Vec<MealCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.meal_type, COUNT(*) FROM food_diary_entries e
             JOIN foods f ON e.food_id = f.id
             WHERE e.user_id = ?1 AND e.entry_date = ?2
             GROUP BY e.meal_type",
        )?;
        let rows = stmt
            .query_map(params![user_id, date_str(date)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = Vec::with_capacity(rows.len());
        for (meal_type, count) in rows {
            counts.push(MealCount {
                meal_type: meal_type.parse()?,
                count,
            });
        }
        counts.sort_by_key(|c| MealType::ALL.iter().position(|m| *m == c.meal_type));
        Ok(counts)
    }

    /// Delete an entry only when it belongs to `user_id`.
    pub fn delete_diary_entry(&self, id: i64, user_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM food_diary_entries WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewFoodRecord;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn log(db: &Database, user_id: i64, food_id: i64, meal: MealType, date: NaiveDate, cal: Option<f64>) -> DiaryEntry {
        db.insert_diary_entry(&NewDiaryEntry {
            user_id,
            food_id,
            quantity_grams: 100.0,
            meal_type: meal,
            date,
            notes: None,
            consumed: ConsumedNutrition {
                calories: cal,
                protein_g: cal.map(|c| c / 10.0),
                ..Default::default()
            },
        })
        .unwrap()
    }

    fn food(db: &Database) -> i64 {
        db.insert_food(&NewFoodRecord {
            name: "Oats".to_string(),
            brand: None,
            barcode: None,
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_insert_and_list_for_date() {
        let db = Database::open_in_memory().unwrap();
        let food_id = food(&db);
        let e1 = log(&db, 1, food_id, MealType::Breakfast, day(1), Some(100.0));
        log(&db, 1, food_id, MealType::Lunch, day(1), Some(200.0));
        log(&db, 1, food_id, MealType::Lunch, day(2), Some(300.0));
        log(&db, 2, food_id, MealType::Lunch, day(1), Some(400.0));

        assert_eq!(e1.food_name, "Oats");
        assert_eq!(e1.meal_type, MealType::Breakfast);
        assert_eq!(e1.date, day(1));

        let entries = db.get_diary_entries_for_date(1, day(1)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, e1.id);

        let lunch = db.get_diary_entries_for_meal(1, day(1), MealType::Lunch).unwrap();
        assert_eq!(lunch.len(), 1);
        assert_eq!(lunch[0].consumed.calories, Some(200.0));
    }

    #[test]
    fn test_between_orders_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let food_id = food(&db);
        log(&db, 1, food_id, MealType::Dinner, day(1), None);
        log(&db, 1, food_id, MealType::Dinner, day(5), None);
        log(&db, 1, food_id, MealType::Dinner, day(9), None);

        let week = db.get_diary_entries_between(1, day(1), day(7)).unwrap();
        let dates: Vec<NaiveDate> = week.iter().map(|e| e.date).collect();
        assert_eq!(dates, vec![day(5), day(1)]);
    }

    #[test]
    fn test_totals_and_counts() {
        let db = Database::open_in_memory().unwrap();
        let food_id = food(&db);
        log(&db, 1, food_id, MealType::Snack, day(1), Some(100.0));
        log(&db, 1, food_id, MealType::Breakfast, day(1), Some(250.0));
        log(&db, 1, food_id, MealType::Snack, day(1), None);

        let (totals, count) = db.diary_totals(1, day(1)).unwrap();
        assert_eq!(count, 3);
        assert_eq!(totals.calories, 350.0);
        assert_eq!(totals.protein_g, 35.0);
        assert_eq!(totals.fiber_g, 0.0);

        let counts = db.diary_meal_counts(1, day(1)).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].meal_type, MealType::Breakfast);
        assert_eq!(counts[1].meal_type, MealType::Snack);
        assert_eq!(counts[1].count, 2);

        let (empty, zero) = db.diary_totals(1, day(2)).unwrap();
        assert_eq!(zero, 0);
        assert_eq!(empty.calories, 0.0);
    }

    #[test]
    fn test_delete_is_scoped_to_user() {
        let db = Database::open_in_memory().unwrap();
        let food_id = food(&db);
        let entry = log(&db, 1, food_id, MealType::Other, day(1), None);

        assert!(!db.delete_diary_entry(entry.id, 2).unwrap());
        assert!(db.get_diary_entry(entry.id).unwrap().is_some());
        assert!(db.delete_diary_entry(entry.id, 1).unwrap());
        assert!(db.get_diary_entry(entry.id).unwrap().is_none());
    }

    #[test]
    fn test_entries_for_cleared_foods_are_hidden() {
        let db = Database::open_in_memory().unwrap();
        let food_id = food(&db);
        log(&db, 1, food_id, MealType::Lunch, day(1), Some(10.0));
        db.clear_foods().unwrap();
        assert!(db.get_diary_entries_for_date(1, day(1)).unwrap().is_empty());

        let (totals, count) = db.diary_totals(1, day(1)).unwrap();
        assert_eq!(count, 0);
        assert_eq!(totals.calories, 0.0);
        assert!(db.diary_meal_counts(1, day(1)).unwrap().is_empty());

        // Only the entry whose food still exists is summed.
        let fresh = food(&db);
        log(&db, 1, fresh, MealType::Dinner, day(1), Some(30.0));
        let (totals, count) = db.diary_totals(1, day(1)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(totals.calories, 30.0);
        assert_eq!(db.get_diary_entries_for_date(1, day(1)).unwrap().len(), 1);
    }
}
