//! Google OAuth 2.0 authorization-code flow.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    config::GoogleConfig,
    error::{AppError, AppResult},
};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// The parts of a Google account the identity store cares about.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GoogleProfile {
    #[serde(rename = "sub")]
    pub id: String,
    pub email: String,
    /// Missing means unverified.
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    http: Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;
        Ok(Self { config, http })
    }

    /// Consent page URL the browser is redirected to.
    pub fn authorize_url(&self, state: &str) -> AppResult<Url> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AppError::Internal(e.into()))
    }

    /// Trade the callback `code` for an access token and read the signed-in profile.
    pub async fn fetch_profile(&self, code: &str) -> AppResult<GoogleProfile> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Google token exchange failed with status {status}: {text}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(provider_error)?;

        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::ExternalService(format!(
                "Google profile request failed with status {status}"
            )));
        }

        response.json().await.map_err(provider_error)
    }
}

fn provider_error(err: reqwest::Error) -> AppError {
    AppError::ExternalService(format!("Google sign-in failed: {err}"))
}
