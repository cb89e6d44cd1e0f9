use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::{
    dto::auth::{AdminAuthResponse, LoginRequest, RegisterRequest},
    error::AppResult,
    extract::AppJson,
    middleware::auth::AuthUser,
    models::Admin,
    response::ApiResponse,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_admin))
        .route("/login", post(login_admin))
        .route("/me", get(current_admin))
}

#[utoipa::path(
    post,
    path = "/api/admin/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Administrator created", body = ApiResponse<AdminAuthResponse>),
        (status = 401, description = "A token is required once an administrator exists"),
        (status = 403, description = "Caller is not an administrator")
    ),
    security((), ("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn register_admin(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AdminAuthResponse>>)> {
    let resp = admin_service::register_admin(&state, caller.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Administrator signed in", body = ApiResponse<AdminAuthResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Admin"
)]
pub async fn login_admin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<AdminAuthResponse>>> {
    let resp = admin_service::login_admin(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/me",
    responses(
        (status = 200, description = "Signed-in administrator", body = ApiResponse<Admin>),
        (status = 403, description = "Caller is not an administrator")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn current_admin(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Admin>>> {
    let resp = admin_service::current_admin(&state, &user).await?;
    Ok(Json(resp))
}
