use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, TokenIssuer, TokenType, hash_password, verify_password};
use crate::db::Database;
use crate::error::AccountError;
use crate::models::{
    FitnessSummary, ProfileOptions, ProfileUpdate, Units, User, age_in_years, bmi, bmi_category,
    round2, validate_email, validate_password, validate_username,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileUpdate,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn invalid(err: anyhow::Error) -> AccountError {
    AccountError::Invalid(err.to_string())
}

fn positive<T: PartialOrd + Default + Copy>(v: Option<T>) -> Option<T> {
    v.filter(|x| *x > T::default())
}

/// Apply the provided fields of `update` to `user`. Non-positive numbers are ignored.
fn apply_profile(user: &mut User, update: &ProfileUpdate) -> Result<(), AccountError> {
    if let Some(username) = &update.username {
        user.username = validate_username(username).map_err(invalid)?;
    }
    if let Some(dob) = update.date_of_birth {
        if dob >= Local::now().date_naive() {
            return Err(AccountError::Invalid(
                "date_of_birth must be in the past".to_string(),
            ));
        }
        user.date_of_birth = Some(dob);
    }
    if let Some(g) = &update.gender {
        user.gender = Some(g.parse().map_err(invalid)?);
    }
    if let Some(a) = &update.activity_level {
        user.activity_level = Some(a.parse().map_err(invalid)?);
    }
    if let Some(f) = &update.fitness_goal {
        user.fitness_goal = Some(f.parse().map_err(invalid)?);
    }
    if let Some(u) = &update.preferred_units {
        user.preferred_units = u.parse().map_err(invalid)?;
    }
    if let Some(tz) = update.timezone.as_deref().map(str::trim) {
        user.timezone = (!tz.is_empty()).then(|| tz.to_string());
    }

    macro_rules! apply_positive {
        ($($field:ident),+) => {
            $(
                if let Some(v) = positive(update.$field) {
                    user.$field = Some(v);
                }
            )+
        };
    }
    apply_positive!(
        height_cm,
        current_weight_kg,
        target_weight_kg,
        daily_calories_goal,
        daily_protein_goal,
        daily_carbs_goal,
        daily_fat_goal,
        daily_water_goal,
        weekly_workout_goal
    );
    Ok(())
}

pub struct UserService {
    db: Mutex<Database>,
    tokens: TokenIssuer,
}

impl UserService {
    pub fn new(db_path: &Path, tokens: TokenIssuer) -> Result<Self> {
        Ok(Self::with_database(Database::open(db_path)?, tokens))
    }

    pub fn new_in_memory(tokens: TokenIssuer) -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory()?, tokens))
    }

    #[must_use]
    pub fn with_database(db: Database, tokens: TokenIssuer) -> Self {
        Self {
            db: Mutex::new(db),
            tokens,
        }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue_tokens(&self, user: User) -> Result<AuthTokens, AccountError> {
        Ok(AuthTokens {
            access_token: self.tokens.issue(&user, TokenType::Access)?,
            refresh_token: self.tokens.issue(&user, TokenType::Refresh)?,
            token_type: "Bearer",
            expires_in: self.tokens.access_ttl_secs(),
            user,
        })
    }

    // --- Authentication ---

    pub fn register(&self, reg: &Registration) -> Result<AuthTokens, AccountError> {
        let username = validate_username(&reg.username).map_err(invalid)?;
        let email = validate_email(&reg.email).map_err(invalid)?;
        validate_password(&reg.password).map_err(invalid)?;

        let mut user = User {
            id: 0,
            username,
            email,
            password_hash: String::new(),
            date_of_birth: None,
            height_cm: None,
            current_weight_kg: None,
            gender: None,
            activity_level: None,
            fitness_goal: None,
            target_weight_kg: None,
            daily_calories_goal: None,
            daily_protein_goal: None,
            daily_carbs_goal: None,
            daily_fat_goal: None,
            daily_water_goal: None,
            weekly_workout_goal: None,
            preferred_units: Units::Metric,
            timezone: None,
            is_verified: false,
            is_active: true,
            created_at: String::new(),
            updated_at: String::new(),
        };
        apply_profile(&mut user, &ProfileUpdate {
            username: None,
            ..reg.profile.clone()
        })?;

        if self.db().get_user_by_email(&user.email)?.is_some() {
            return Err(AccountError::EmailTaken);
        }
        user.password_hash = hash_password(&reg.password)?;

        let user = self
            .db()
            .insert_user(&user)?
            .ok_or(AccountError::EmailTaken)?;
        tracing::info!(user_id = user.id, "registered account");
        self.issue_tokens(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthTokens, AccountError> {
        let email = email.trim().to_lowercase();
        let user = self
            .db()
            .get_user_by_email(&email)?
            .ok_or(AccountError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AccountError::Inactive);
        }
        self.issue_tokens(user)
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AccountError> {
        let claims = self.tokens.verify(refresh_token, TokenType::Refresh)?;
        let user = self
            .db()
            .get_user(claims.user_id)?
            .ok_or(AccountError::InvalidToken)?;
        if !user.is_active {
            return Err(AccountError::Inactive);
        }
        Ok(AccessToken {
            access_token: self.tokens.issue(&user, TokenType::Access)?,
            token_type: "Bearer",
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Claims of a valid access token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AccountError> {
        self.tokens.verify(token, TokenType::Access)
    }

    // --- Profile ---

    pub fn get_profile(&self, id: i64) -> Result<User, AccountError> {
        self.db().get_user(id)?.ok_or(AccountError::NotFound(id))
    }

    pub fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<User, AccountError> {
        let db = self.db();
        let mut user = db.get_user(id)?.ok_or(AccountError::NotFound(id))?;
        apply_profile(&mut user, update)?;
        Ok(db.update_user(&user)?)
    }

    pub fn change_password(
        &self,
        id: i64,
        current: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let user = self.get_profile(id)?;
        if !verify_password(current, &user.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }
        validate_password(new_password).map_err(invalid)?;
        let hash = hash_password(new_password)?;
        self.db().update_password_hash(id, &hash)?;
        Ok(())
    }

    pub fn delete_account(&self, id: i64, password: &str) -> Result<(), AccountError> {
        let user = self.get_profile(id)?;
        if !verify_password(password, &user.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }
        self.db().delete_user(id)?;
        tracing::info!(user_id = id, "deleted account");
        Ok(())
    }

    pub fn fitness_summary(&self, id: i64) -> Result<FitnessSummary, AccountError> {
        let user = self.get_profile(id)?;
        let today = Local::now().date_naive();
        let bmi = bmi(user.height_cm, user.current_weight_kg);
        let weight_difference_kg = match (user.current_weight_kg, user.target_weight_kg) {
            (Some(current), Some(target)) => Some(round2(current - target)),
            _ => None,
        };
        Ok(FitnessSummary {
            user_id: user.id,
            username: user.username,
            age: user.date_of_birth.map(|dob| age_in_years(dob, today)),
            bmi,
            bmi_category: bmi_category(bmi),
            current_weight_kg: user.current_weight_kg,
            target_weight_kg: user.target_weight_kg,
            weight_difference_kg,
            fitness_goal: user.fitness_goal,
            activity_level: user.activity_level,
            daily_calories_goal: user.daily_calories_goal,
            weekly_workout_goal: user.weekly_workout_goal,
        })
    }

    #[must_use]
    pub fn options(&self) -> ProfileOptions {
        ProfileOptions::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityLevel, FitnessGoal, Gender};
    use chrono::NaiveDate;

    fn service() -> UserService {
        UserService::new_in_memory(TokenIssuer::new(b"test-secret")).unwrap()
    }

    fn registration(email: &str) -> Registration {
        Registration {
            username: "ann".to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
            profile: ProfileUpdate::default(),
        }
    }

    #[test]
    fn test_register_and_login() {
        let svc = service();
        let tokens = svc.register(&registration("Ann@Example.com")).unwrap();
        assert_eq!(tokens.user.email, "ann@example.com");
        assert_eq!(tokens.token_type, "Bearer");
        assert_eq!(tokens.expires_in, 86400);

        let claims = svc.validate_token(&tokens.access_token).unwrap();
        assert_eq!(claims.user_id, tokens.user.id);

        let login = svc.login(" ANN@example.com ", "hunter22").unwrap();
        assert_eq!(login.user.id, tokens.user.id);
    }

    #[test]
    fn test_register_rejects_duplicates_and_bad_input() {
        let svc = service();
        svc.register(&registration("ann@example.com")).unwrap();
        assert!(matches!(
            svc.register(&registration("ANN@example.com")),
            Err(AccountError::EmailTaken)
        ));
        assert!(matches!(
            svc.register(&registration("not-an-email")),
            Err(AccountError::Invalid(_))
        ));
        let mut short = registration("bob@example.com");
        short.password = "123".to_string();
        assert!(matches!(svc.register(&short), Err(AccountError::Invalid(_))));
        let mut bad_goal = registration("bob@example.com");
        bad_goal.profile.fitness_goal = Some("GET_RICH".to_string());
        assert!(matches!(svc.register(&bad_goal), Err(AccountError::Invalid(_))));
    }

    #[test]
    fn test_login_failures_are_uniform() {
        let svc = service();
        svc.register(&registration("ann@example.com")).unwrap();
        assert!(matches!(
            svc.login("ann@example.com", "wrong"),
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("nobody@example.com", "hunter22"),
            Err(AccountError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let svc = service();
        let tokens = svc.register(&registration("ann@example.com")).unwrap();
        let refreshed = svc.refresh(&tokens.refresh_token).unwrap();
        assert!(svc.validate_token(&refreshed.access_token).is_ok());
        assert!(matches!(
            svc.refresh(&tokens.access_token),
            Err(AccountError::InvalidToken)
        ));
        assert!(svc.validate_token(&tokens.refresh_token).is_err());
    }

    #[test]
    fn test_full_registration_and_profile_update() {
        let svc = service();
        let mut reg = registration("ann@example.com");
        reg.profile = ProfileUpdate {
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1),
            height_cm: Some(180.0),
            current_weight_kg: Some(90.0),
            target_weight_kg: Some(80.0),
            gender: Some("female".to_string()),
            activity_level: Some("moderately_active".to_string()),
            fitness_goal: Some("LOSE_WEIGHT".to_string()),
            ..Default::default()
        };
        let user = svc.register(&reg).unwrap().user;
        assert_eq!(user.gender, Some(Gender::Female));
        assert_eq!(user.activity_level, Some(ActivityLevel::ModeratelyActive));

        let updated = svc
            .update_profile(
                user.id,
                &ProfileUpdate {
                    current_weight_kg: Some(85.5),
                    height_cm: Some(-1.0),
                    daily_calories_goal: Some(0),
                    weekly_workout_goal: Some(4),
                    preferred_units: Some("imperial".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.current_weight_kg, Some(85.5));
        assert_eq!(updated.height_cm, Some(180.0));
        assert!(updated.daily_calories_goal.is_none());
        assert_eq!(updated.weekly_workout_goal, Some(4));
        assert_eq!(updated.preferred_units, Units::Imperial);

        let summary = svc.fitness_summary(user.id).unwrap();
        assert_eq!(summary.bmi, 26.39);
        assert_eq!(summary.bmi_category, "Overweight");
        assert_eq!(summary.weight_difference_kg, Some(5.5));
        assert_eq!(summary.fitness_goal, Some(FitnessGoal::LoseWeight));
        assert!(summary.age.unwrap() >= 34);

        assert!(matches!(
            svc.update_profile(user.id + 1, &ProfileUpdate::default()),
            Err(AccountError::NotFound(_))
        ));
    }

    #[test]
    fn test_change_password_and_delete() {
        let svc = service();
        let id = svc.register(&registration("ann@example.com")).unwrap().user.id;

        assert!(matches!(
            svc.change_password(id, "wrong", "newpass1"),
            Err(AccountError::InvalidCredentials)
        ));
        svc.change_password(id, "hunter22", "newpass1").unwrap();
        assert!(svc.login("ann@example.com", "hunter22").is_err());
        assert!(svc.login("ann@example.com", "newpass1").is_ok());

        assert!(matches!(
            svc.delete_account(id, "hunter22"),
            Err(AccountError::InvalidCredentials)
        ));
        svc.delete_account(id, "newpass1").unwrap();
        assert!(matches!(svc.get_profile(id), Err(AccountError::NotFound(_))));
    }

    #[test]
    fn test_options_lists_every_choice() {
        let opts = service().options();
        assert_eq!(opts.genders.len(), 4);
        assert_eq!(opts.activity_levels.len(), 5);
        assert_eq!(opts.fitness_goals.len(), 7);
        assert_eq!(opts.units, vec!["METRIC", "IMPERIAL"]);
    }
}
