//! Password hashing and bearer token issuance for the account service.
//!
//! Passwords are stored as Argon2id PHC strings. Tokens are HS256 JWTs
//! carrying the user id and a `type` claim that separates short-lived access
//! tokens from refresh tokens.

use anyhow::{Result, anyhow};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AccountError;
use crate::models::User;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account email.
    pub sub: String,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            refresh_ttl: Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }

    #[must_use]
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl.num_seconds()
    }

    pub fn issue(&self, user: &User, token_type: TokenType) -> Result<String> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.email.clone(),
            user_id: user.id,
            name: user.username.clone(),
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| anyhow!("Failed to sign token: {e}"))
    }

    /// Check signature, expiry and token type.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, AccountError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| AccountError::InvalidToken)?;
        if data.claims.token_type != expected {
            return Err(AccountError::InvalidToken);
        }
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&bytes).map_err(|e| anyhow!("Failed to encode salt: {e}"))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for an unparseable stored hash.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Units;

    fn user() -> User {
        User {
            id: 42,
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
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
        }
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
        // Salted: same password hashes differently.
        assert_ne!(hash, hash_password("correct horse").unwrap());
    }

    #[test]
    fn test_issue_and_verify_tokens() {
        let issuer = TokenIssuer::new(b"test-secret");
        let access = issuer.issue(&user(), TokenType::Access).unwrap();
        let claims = issuer.verify(&access, TokenType::Access).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "ann@example.com");
        assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_TTL_SECS);

        // An access token is not accepted where a refresh token is expected.
        assert!(matches!(
            issuer.verify(&access, TokenType::Refresh),
            Err(AccountError::InvalidToken)
        ));

        let refresh = issuer.issue(&user(), TokenType::Refresh).unwrap();
        let claims = issuer.verify(&refresh, TokenType::Refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, REFRESH_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let issuer = TokenIssuer::new(b"test-secret");
        let other = TokenIssuer::new(b"other-secret");
        let token = other.issue(&user(), TokenType::Access).unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_err());
        assert!(issuer.verify("garbage", TokenType::Access).is_err());

        let expired = TokenIssuer::new(b"test-secret")
            .with_ttl(Duration::seconds(-600), Duration::seconds(-600));
        let token = expired.issue(&user(), TokenType::Access).unwrap();
        assert!(issuer.verify(&token, TokenType::Access).is_err());
    }
}
