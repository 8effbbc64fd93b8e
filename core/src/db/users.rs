use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::params;

use super::Database;
use crate::models::User;

const USER_SELECT: &str = "SELECT id, username, email, password_hash, date_of_birth, height_cm,
        current_weight_kg, gender, activity_level, fitness_goal, target_weight_kg,
        daily_calories_goal, daily_protein_goal, daily_carbs_goal, daily_fat_goal,
        daily_water_goal, weekly_workout_goal, preferred_units, timezone, is_verified,
        is_active, created_at, updated_at
 FROM users";

fn parse_column<T>(idx: usize, value: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })
        })
        .transpose()
}

impl Database {
    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let date_of_birth: Option<String> = row.get(4)?;
        let date_of_birth = date_of_birth
            .map(|d| {
                NaiveDate::parse_from_str(&d, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })
            })
            .transpose()?;
        let preferred_units: Option<String> = row.get(17)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            date_of_birth,
            height_cm: row.get(5)?,
            current_weight_kg: row.get(6)?,
            gender: parse_column(7, row.get(7)?)?,
            activity_level: parse_column(8, row.get(8)?)?,
            fitness_goal: parse_column(9, row.get(9)?)?,
            target_weight_kg: row.get(10)?,
            daily_calories_goal: row.get(11)?,
            daily_protein_goal: row.get(12)?,
            daily_carbs_goal: row.get(13)?,
            daily_fat_goal: row.get(14)?,
            daily_water_goal: row.get(15)?,
            weekly_workout_goal: row.get(16)?,
            preferred_units: parse_column(17, preferred_units)?.unwrap_or(crate::models::Units::Metric),
            timezone: row.get(18)?,
            is_verified: row.get(19)?,
            is_active: row.get(20)?,
            created_at: row.get(21)?,
            updated_at: row.get(22)?,
        })
    }

    /// Insert a new account. Returns `None` when the email is already registered.
    pub fn insert_user(&self, user: &User) -> Result<Option<User>> {
        let now = Local::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT INTO users
                (username, email, password_hash, date_of_birth, height_cm, current_weight_kg,
                 gender, activity_level, fitness_goal, target_weight_kg, daily_calories_goal,
                 daily_protein_goal, daily_carbs_goal, daily_fat_goal, daily_water_goal,
                 weekly_workout_goal, preferred_units, timezone, is_verified, is_active,
                 created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                     ?17, ?18, ?19, ?20, ?21, ?21)
             ON CONFLICT(email) DO NOTHING",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
                user.height_cm,
                user.current_weight_kg,
                user.gender.map(|v| v.as_str()),
                user.activity_level.map(|v| v.as_str()),
                user.fitness_goal.map(|v| v.as_str()),
                user.target_weight_kg,
                user.daily_calories_goal,
                user.daily_protein_goal,
                user.daily_carbs_goal,
                user.daily_fat_goal,
                user.daily_water_goal,
                user.weekly_workout_goal,
                user.preferred_units.as_str(),
                user.timezone,
                user.is_verified,
                user.is_active,
                now,
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        let id = self.conn.last_insert_rowid();
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(&format!("{USER_SELECT} WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT} WHERE email = ?1"))?;
        let mut rows = stmt.query(params![email])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Persist every mutable profile field of `user`.
    pub fn update_user(&self, user: &User) -> Result<User> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE users SET
                username = ?1, date_of_birth = ?2, height_cm = ?3, current_weight_kg = ?4,
                gender = ?5, activity_level = ?6, fitness_goal = ?7, target_weight_kg = ?8,
                daily_calories_goal = ?9, daily_protein_goal = ?10, daily_carbs_goal = ?11,
                daily_fat_goal = ?12, daily_water_goal = ?13, weekly_workout_goal = ?14,
                preferred_units = ?15, timezone = ?16, updated_at = ?17
             WHERE id = ?18",
            params![
                user.username,
                user.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
                user.height_cm,
                user.current_weight_kg,
                user.gender.map(|v| v.as_str()),
                user.activity_level.map(|v| v.as_str()),
                user.fitness_goal.map(|v| v.as_str()),
                user.target_weight_kg,
                user.daily_calories_goal,
                user.daily_protein_goal,
                user.daily_carbs_goal,
                user.daily_fat_goal,
                user.daily_water_goal,
                user.weekly_workout_goal,
                user.preferred_units.as_str(),
                user.timezone,
                now,
                user.id,
            ],
        )?;
        self.get_user(user.id)?.context("User vanished after update")
    }

    pub fn update_password_hash(&self, id: i64, password_hash: &str) -> Result<bool> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, now, id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FitnessGoal, Gender, Units};

    fn sample_user() -> User {
        User {
            id: 0,
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            password_hash: "hash".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17),
            height_cm: Some(170.0),
            current_weight_kg: Some(65.0),
            gender: Some(Gender::Female),
            activity_level: None,
            fitness_goal: Some(FitnessGoal::BuildMuscle),
            target_weight_kg: Some(60.0),
            daily_calories_goal: Some(2000),
            daily_protein_goal: None,
            daily_carbs_goal: None,
            daily_fat_goal: None,
            daily_water_goal: Some(2.5),
            weekly_workout_goal: Some(3),
            preferred_units: Units::Metric,
            timezone: Some("Europe/Berlin".to_string()),
            is_verified: false,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_insert_and_get_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.insert_user(&sample_user()).unwrap().unwrap();
        assert!(user.id > 0);
        assert_eq!(user.gender, Some(Gender::Female));
        assert_eq!(user.date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert!(!user.created_at.is_empty());

        let by_email = db.get_user_by_email("ann@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(db.get_user(user.id + 1).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_user(&sample_user()).unwrap().unwrap();
        assert!(db.insert_user(&sample_user()).unwrap().is_none());
    }

    #[test]
    fn test_update_and_delete_user() {
        let db = Database::open_in_memory().unwrap();
        let mut user = db.insert_user(&sample_user()).unwrap().unwrap();
        user.current_weight_kg = Some(63.5);
        user.preferred_units = Units::Imperial;
        let updated = db.update_user(&user).unwrap();
        assert_eq!(updated.current_weight_kg, Some(63.5));
        assert_eq!(updated.preferred_units, Units::Imperial);

        assert!(db.update_password_hash(user.id, "new-hash").unwrap());
        assert_eq!(db.get_user(user.id).unwrap().unwrap().password_hash, "new-hash");

        assert!(db.delete_user(user.id).unwrap());
        assert!(!db.delete_user(user.id).unwrap());
    }
}
