use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
};
use reqwest::Url;

use crate::{
    dto::auth::{AuthResponse, GoogleCallbackQuery, LoginRequest, RegisterRequest},
    error::{AppError, AppResult},
    extract::{AppJson, AppQuery},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/google", get(google_start))
        .route("/google/callback", get(google_callback))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Register shopper", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid input or user already exists")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    let resp = auth_service::register_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login shopper", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials, or the account uses Google sign-in")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let resp = auth_service::login_user(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Signed-in shopper", body = ApiResponse<User>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::current_user(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/auth/google",
    responses(
        (status = 303, description = "Redirect to the Google consent page"),
        (status = 404, description = "Google sign-in is not configured")
    ),
    tag = "Auth"
)]
pub async fn google_start(State(state): State<AppState>) -> AppResult<Redirect> {
    let url = auth_service::google_authorize_url(&state)?;
    Ok(Redirect::to(&url))
}

#[utoipa::path(
    get,
    path = "/api/auth/google/callback",
    params(GoogleCallbackQuery),
    responses(
        (status = 303, description = "Redirect to the frontend with a token, or to its login page on failure")
    ),
    tag = "Auth"
)]
pub async fn google_callback(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<GoogleCallbackQuery>,
) -> Redirect {
    let outcome = match (query.error, query.code, query.state) {
        (Some(error), _, _) => Err(AppError::unauthorized(format!("Google sign-in refused: {error}"))),
        (None, Some(code), Some(oauth_state)) => {
            auth_service::complete_google_sign_in(&state, &code, &oauth_state).await
        }
        _ => Err(AppError::validation("Missing code or state")),
    };

    match outcome.and_then(|auth| success_redirect(&state.frontend_url, &auth)) {
        Ok(url) => Redirect::to(&url),
        Err(err) => {
            tracing::warn!(error = %err, "google sign-in failed");
            Redirect::to(&failure_redirect(&state.frontend_url))
        }
    }
}

fn success_redirect(frontend_url: &str, auth: &AuthResponse) -> AppResult<String> {
    let url = Url::parse_with_params(
        &format!("{frontend_url}/auth/success"),
        &[
            ("token", auth.token.as_str()),
            ("name", auth.user.name.as_str()),
            ("email", auth.user.email.as_str()),
        ],
    )
    .map_err(|e| AppError::Internal(e.into()))?;
    Ok(url.to_string())
}

fn failure_redirect(frontend_url: &str) -> String {
    format!("{frontend_url}/login?error=auth_failed")
}
