#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use storefront_api::{
    credentials::TokenIssuer,
    db::{DbPool, create_orm_conn, create_pool, run_migrations},
    dto::auth::RegisterRequest,
    images::{HostedImage, ImageHost, ImageHostError, ImageUpload},
    middleware::auth::AuthUser,
    models::Role,
    services::auth_service,
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Upload(String),
    Delete(String),
}

/// In-memory image host that records every call. Uploads succeed unless the file name
/// was marked failing; deletes succeed unless the external id was.
#[derive(Default)]
pub struct RecordingImageHost {
    calls: Mutex<Vec<HostCall>>,
    failing_uploads: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl RecordingImageHost {
    pub fn external_id(file_name: &str) -> String {
        format!("test/{file_name}")
    }

    pub fn fail_upload_of(&self, file_name: &str) {
        self.failing_uploads.lock().unwrap().insert(file_name.to_string());
    }

    pub fn fail_delete_of(&self, external_id: &str) {
        self.failing_deletes.lock().unwrap().insert(external_id.to_string());
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Delete(id) => Some(id),
                HostCall::Upload(_) => None,
            })
            .collect()
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Upload(id) => Some(id),
                HostCall::Delete(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ImageHost for RecordingImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError> {
        if self.failing_uploads.lock().unwrap().contains(&image.file_name) {
            return Err(ImageHostError::Rejected(format!("upload of {} refused", image.file_name)));
        }
        let external_id = Self::external_id(&image.file_name);
        self.calls.lock().unwrap().push(HostCall::Upload(external_id.clone()));
        Ok(HostedImage {
            url: format!("https://images.test/{}", image.file_name),
            external_id,
        })
    }

    async fn delete(&self, external_id: String) -> Result<(), ImageHostError> {
        self.calls.lock().unwrap().push(HostCall::Delete(external_id.clone()));
        if self.failing_deletes.lock().unwrap().contains(&external_id) {
            return Err(ImageHostError::Rejected(format!("delete of {external_id} refused")));
        }
        Ok(())
    }
}

pub fn png(file_name: &str) -> ImageUpload {
    ImageUpload {
        file_name: file_name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    }
}

/// State backed by the test database, or `None` when no database is configured.
pub async fn test_state() -> anyhow::Result<Option<AppState>> {
    test_state_with(Arc::new(RecordingImageHost::default())).await
}

pub async fn test_state_with(images: Arc<dyn ImageHost>) -> anyhow::Result<Option<AppState>> {
    let Ok(database_url) =
        std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))
    else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(None);
    };

    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;
    Ok(Some(state_for(pool, images)))
}

/// State whose pool never connects. Enough for requests rejected before any query runs.
pub fn offline_state() -> anyhow::Result<AppState> {
    let pool = PgPoolOptions::new().connect_lazy("postgres://storefront@localhost:1/unused")?;
    Ok(state_for(pool, Arc::new(RecordingImageHost::default())))
}

fn state_for(pool: DbPool, images: Arc<dyn ImageHost>) -> AppState {
    AppState {
        orm: create_orm_conn(&pool),
        pool,
        tokens: TokenIssuer::new("integration-test-secret", 1),
        images,
        google: None,
        frontend_url: "http://localhost:3000".to_string(),
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

pub fn admin() -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        role: Role::Admin,
    }
}

pub fn shopper(user_id: Uuid) -> AuthUser {
    AuthUser {
        user_id,
        role: Role::Shopper,
    }
}

/// Register a local shopper and return the caller identity for it.
pub async fn register_shopper(state: &AppState, name: &str) -> anyhow::Result<AuthUser> {
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            name: name.to_string(),
            email: unique_email(name),
            password: "secret123".to_string(),
        },
    )
    .await?;
    let auth = resp.data.expect("auth response");
    Ok(shopper(auth.user.id))
}
