use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use uuid::Uuid;

use crate::{error::AppError, models::Role, state::AppState};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn ensure_role(user: &AuthUser, role: Role) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, Role::Admin)
}

/// Shoppers may only act on their own cart; administrators may act on any.
pub fn ensure_owner_or_admin(user: &AuthUser, owner: Uuid) -> Result<(), AppError> {
    if user.is_admin() || (user.role == Role::Shopper && user.user_id == owner) {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::unauthorized("Invalid Authorization header"))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::unauthorized("Invalid Authorization scheme"))?
        .trim();

    Ok(Some(token))
}

fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = state.tokens.verify(token)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::unauthorized("Invalid user id in token"))?;

    Ok(AuthUser {
        user_id,
        role: claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| AppError::unauthorized("Not authorized, no token"))?;
        authenticate(token, state)
    }
}

impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => authenticate(token, state).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn shopper_reaches_only_their_own_cart() {
        let shopper = user(Role::Shopper);
        assert!(ensure_owner_or_admin(&shopper, shopper.user_id).is_ok());
        assert!(matches!(
            ensure_owner_or_admin(&shopper, Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn admin_reaches_any_cart_and_admin_routes() {
        let admin = user(Role::Admin);
        assert!(ensure_owner_or_admin(&admin, Uuid::new_v4()).is_ok());
        assert!(ensure_admin(&admin).is_ok());
        assert!(ensure_admin(&user(Role::Shopper)).is_err());
    }
}
