use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::record_admin_action,
    credentials::{hash_password, verify_password},
    dto::auth::{AdminAuthResponse, LoginRequest, RegisterRequest},
    entity::admins::{ActiveModel as AdminActive, Column as AdminCol, Entity as Admins, Model as AdminModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Admin, Role},
    response::ApiResponse,
    state::AppState,
};

/// Create an administrator. While no administrator exists the first one may register
/// without a token; after that only an authenticated administrator may add more.
pub async fn register_admin(
    state: &AppState,
    caller: Option<&AuthUser>,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<AdminAuthResponse>> {
    let txn = state.orm.begin().await?;
    // Held until commit: concurrent registrations queue here, so only one can see an
    // empty table.
    txn.execute_unprepared("LOCK TABLE admins IN SHARE ROW EXCLUSIVE MODE").await?;

    let existing_admins = Admins::find().count(&txn).await?;
    if existing_admins > 0 {
        let caller = caller.ok_or_else(|| AppError::unauthorized("Not authorized, no token"))?;
        ensure_admin(caller)?;
    }

    let registration = payload.validate()?;

    let taken = Admins::find()
        .filter(AdminCol::Email.eq(registration.email.as_str()))
        .one(&txn)
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Admin already exists".into()));
    }

    let now = Utc::now();
    let admin = AdminActive {
        id: Set(Uuid::new_v4()),
        name: Set(registration.name),
        email: Set(registration.email),
        password_hash: Set(hash_password(&registration.password)?),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| AppError::conflict_on_duplicate(err, "Admin already exists"))?;
    txn.commit().await?;

    match caller {
        Some(caller) => {
            record_admin_action(
                &state.pool,
                caller,
                "admin_register",
                "admins",
                serde_json::json!({ "admin_id": admin.id }),
            )
            .await;
        }
        None => tracing::warn!(admin_id = %admin.id, "first administrator registered"),
    }

    let token = state.tokens.issue(admin.id, Role::Admin)?;
    Ok(ApiResponse::success(
        "Admin registered successfully",
        AdminAuthResponse {
            token,
            admin: admin_from_entity(admin),
        },
        None,
    ))
}

pub async fn login_admin(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<AdminAuthResponse>> {
    let (email, password) = payload.validate()?;

    let admin = Admins::find()
        .filter(AdminCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

    if !verify_password(&password, &admin.password_hash)? {
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    tracing::info!(admin_id = %admin.id, "admin logged in");
    let token = state.tokens.issue(admin.id, Role::Admin)?;
    Ok(ApiResponse::success(
        "Login successful",
        AdminAuthResponse {
            token,
            admin: admin_from_entity(admin),
        },
        None,
    ))
}

pub async fn current_admin(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Admin>> {
    ensure_admin(user)?;
    let admin = Admins::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Admin not found"))?;
    Ok(ApiResponse::success("Admin", admin_from_entity(admin), None))
}

fn admin_from_entity(model: AdminModel) -> Admin {
    Admin {
        id: model.id,
        name: model.name,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
