use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    credentials::{MIN_PASSWORD_LEN, normalize_email},
    error::{AppError, AppResult},
    models::{Admin, Role, User},
};

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registration input after trimming and normalization.
#[derive(Debug, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<Registration> {
        let name = self.name.trim().to_string();
        let email = normalize_email(&self.email);
        if name.is_empty() || email.is_empty() || self.password.is_empty() {
            return Err(AppError::validation(
                "Please provide name, email, and password",
            ));
        }
        if !email.contains('@') {
            return Err(AppError::validation("Please provide a valid email"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(Registration {
            name,
            email,
            password: self.password,
        })
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Returns the normalized email alongside the password.
    pub fn validate(self) -> AppResult<(String, String)> {
        let email = normalize_email(&self.email);
        if email.is_empty() || self.password.is_empty() {
            return Err(AppError::validation("Please provide email and password"));
        }
        Ok((email, self.password))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminAuthResponse {
    pub token: String,
    pub admin: Admin,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn registration_normalizes_input() {
        let registration = request("  Ann ", " Ann@Shop.PK ", "secret1").validate().unwrap();
        assert_eq!(
            registration,
            Registration {
                name: "Ann".into(),
                email: "ann@shop.pk".into(),
                password: "secret1".into(),
            }
        );
    }

    #[test]
    fn registration_requires_every_field() {
        assert!(request("", "a@b.c", "secret1").validate().is_err());
        assert!(request("Ann", "  ", "secret1").validate().is_err());
        assert!(request("Ann", "a@b.c", "").validate().is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        let err = request("Ann", "a@b.c", "12345").validate().unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
    }

    #[test]
    fn login_lowercases_email() {
        let (email, password) = LoginRequest {
            email: "Bob@Example.com".into(),
            password: "pw".into(),
        }
        .validate()
        .unwrap();
        assert_eq!(email, "bob@example.com");
        assert_eq!(password, "pw");
    }
}
