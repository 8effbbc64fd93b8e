use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

mod diary;
mod foods;
mod users;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS foods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    brand TEXT,
                    barcode TEXT UNIQUE,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_nutrition (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    food_id INTEGER NOT NULL UNIQUE REFERENCES foods(id),
                    calories REAL NOT NULL,
                    protein_g REAL NOT NULL,
                    carbs_g REAL NOT NULL,
                    fat_g REAL NOT NULL,
                    fiber_g REAL,
                    sugar_g REAL,
                    sodium_mg REAL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS food_diary_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    food_id INTEGER NOT NULL REFERENCES foods(id),
                    quantity_grams REAL NOT NULL,
                    meal_type TEXT NOT NULL,
                    entry_date TEXT NOT NULL,
                    notes TEXT,
                    calories REAL,
                    protein_g REAL,
                    carbs_g REAL,
                    fat_g REAL,
                    fiber_g REAL,
                    sugar_g REAL,
                    sodium_mg REAL,
                    logged_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    date_of_birth TEXT,
                    height_cm REAL,
                    current_weight_kg REAL,
                    gender TEXT,
                    activity_level TEXT,
                    fitness_goal TEXT,
                    target_weight_kg REAL,
                    daily_calories_goal INTEGER,
                    daily_protein_goal REAL,
                    daily_carbs_goal REAL,
                    daily_fat_goal REAL,
                    daily_water_goal REAL,
                    weekly_workout_goal INTEGER,
                    preferred_units TEXT NOT NULL DEFAULT 'METRIC',
                    timezone TEXT,
                    is_verified INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_foods_name ON foods(name);
                CREATE INDEX IF NOT EXISTS idx_diary_user_date ON food_diary_entries(user_id, entry_date);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("fitplat-migrate-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.db");
        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
        drop(db);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("app"), "%app%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
