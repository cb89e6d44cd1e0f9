//! Credential handling shared by shopper and administrator identities.

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    error::{AppError, AppResult},
    models::Role,
};

pub const MIN_PASSWORD_LEN: usize = 6;

const OAUTH_STATE_PURPOSE: &str = "google-oauth";
const OAUTH_STATE_TTL_MINUTES: i64 = 10;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Trim and lower-case an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize)]
struct OAuthStateClaims {
    purpose: String,
    nonce: String,
    exp: usize,
}

/// Signs and verifies session tokens for both identity roles.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn issue(&self, subject: Uuid, role: Role) -> AppResult<String> {
        let expiration = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

        let claims = Claims {
            sub: subject.to_string(),
            role,
            exp: expiration.timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::unauthorized("Invalid or expired token"))
    }

    /// Short-lived token carried through the OAuth redirect as the `state` parameter.
    pub fn issue_oauth_state(&self) -> AppResult<String> {
        let expiration = Utc::now() + Duration::minutes(OAUTH_STATE_TTL_MINUTES);
        let claims = OAuthStateClaims {
            purpose: OAUTH_STATE_PURPOSE.to_string(),
            nonce: Uuid::new_v4().to_string(),
            exp: expiration.timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
    }

    pub fn verify_oauth_state(&self, state: &str) -> AppResult<()> {
        let data = decode::<OAuthStateClaims>(state, &self.decoding, &Validation::default())
            .map_err(|_| AppError::unauthorized("Invalid OAuth state"))?;
        if data.claims.purpose != OAUTH_STATE_PURPOSE {
            return Err(AppError::unauthorized("Invalid OAuth state"));
        }
        Ok(())
    }
}
