use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    credentials::{hash_password, normalize_email, verify_password},
    db::DbPool,
    dto::auth::{AuthResponse, LoginRequest, RegisterRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::{Provider, Role, User},
    oauth::GoogleProfile,
    response::ApiResponse,
    state::AppState,
};

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    avatar_url: String,
    provider: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const INVALID_CREDENTIALS: &str = "Invalid credentials";

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let registration = payload.validate()?;

    if find_by_email(&state.pool, &registration.email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&registration.password)?;
    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, password_hash, provider)
        VALUES ($1, $2, $3, $4, 'local')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&registration.name)
    .bind(&registration.email)
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| duplicate_as_conflict(err, "User already exists"))?;

    tracing::info!(user_id = %row.id, "user registered");
    let response = authenticated(state, row)?;
    Ok(ApiResponse::success("User registered successfully", response, None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AuthResponse>> {
    let (email, password) = payload.validate()?;

    let row = find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if row.provider == Provider::Google.as_str() {
        return Err(AppError::unauthorized("Please login with Google"));
    }

    let Some(hash) = row.password_hash.as_deref() else {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    };
    if !verify_password(&password, hash)? {
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    tracing::info!(user_id = %row.id, "user logged in");
    let response = authenticated(state, row)?;
    Ok(ApiResponse::success("Login successful", response, None))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    ensure_role(user, Role::Shopper)?;
    let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ApiResponse::success("User", user_from_row(row)?, None))
}

/// Resolve a Google profile to a shopper: by Google id, then by email (linking the
/// account), otherwise a new verified Google shopper. Only a verified Google email may
/// link onto an existing account.
pub async fn sign_in_with_google(
    state: &AppState,
    profile: GoogleProfile,
) -> AppResult<AuthResponse> {
    let email = normalize_email(&profile.email);
    if email.is_empty() {
        return Err(AppError::validation("Google account has no email"));
    }
    let avatar = profile.picture.unwrap_or_default();

    let existing: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE google_id = $1")
        .bind(&profile.id)
        .fetch_optional(&state.pool)
        .await?;
    if let Some(row) = existing {
        return authenticated(state, row);
    }

    if let Some(local) = find_by_email(&state.pool, &email).await? {
        if !profile.email_verified {
            tracing::warn!(user_id = %local.id, "refused to link unverified google email");
            return Err(AppError::unauthorized(
                "Google email is not verified; sign in with your password",
            ));
        }
        let row: UserRow = sqlx::query_as(
            r#"
            UPDATE users
            SET google_id = $2,
                provider = 'google',
                avatar_url = CASE WHEN $3 = '' THEN avatar_url ELSE $3 END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(local.id)
        .bind(&profile.id)
        .bind(&avatar)
        .fetch_one(&state.pool)
        .await?;
        tracing::info!(user_id = %row.id, "google account linked to existing user");
        return authenticated(state, row);
    }

    let name = profile
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, google_id, avatar_url, provider, is_verified)
        VALUES ($1, $2, $3, $4, $5, 'google', TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(&email)
    .bind(&profile.id)
    .bind(&avatar)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| duplicate_as_conflict(err, "User already exists"))?;

    tracing::info!(user_id = %row.id, "user created from google sign-in");
    authenticated(state, row)
}

/// Where to send the browser to begin Google sign-in.
pub fn google_authorize_url(state: &AppState) -> AppResult<String> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::not_found("Google sign-in is not configured"))?;
    let oauth_state = state.tokens.issue_oauth_state()?;
    Ok(google.authorize_url(&oauth_state)?.to_string())
}

/// Finish the OAuth round trip: check the state token, read the profile, sign in.
pub async fn complete_google_sign_in(
    state: &AppState,
    code: &str,
    oauth_state: &str,
) -> AppResult<AuthResponse> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::not_found("Google sign-in is not configured"))?;
    state.tokens.verify_oauth_state(oauth_state)?;

    let profile = google.fetch_profile(code).await?;
    sign_in_with_google(state, profile).await
}

async fn find_by_email(pool: &DbPool, email: &str) -> AppResult<Option<UserRow>> {
    Ok(sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?)
}

fn authenticated(state: &AppState, row: UserRow) -> AppResult<AuthResponse> {
    let token = state.tokens.issue(row.id, Role::Shopper)?;
    Ok(AuthResponse {
        token,
        user: user_from_row(row)?,
    })
}

fn duplicate_as_conflict(err: sqlx::Error, message: &str) -> AppError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => AppError::Conflict(message.to_string()),
        _ => AppError::DbError(err),
    }
}

fn user_from_row(row: UserRow) -> AppResult<User> {
    Ok(User {
        id: row.id,
        name: row.name,
        email: row.email,
        avatar_url: row.avatar_url,
        provider: row
            .provider
            .parse()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("unknown provider {}", row.provider)))?,
        is_verified: row.is_verified,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
