use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection, QueryRejection},
};

use crate::error::AppError;

/// `Json` extractor whose rejections are reported through [`AppError`], so malformed
/// bodies get the same envelope as every other validation failure.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Path` extractor; an id that does not parse answers 400 inside the envelope.
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            return AppError::Internal(anyhow::anyhow!(rejection.body_text()));
        }
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        routing::get,
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    #[derive(Deserialize)]
    struct Paging {
        page: Option<i64>,
    }

    async fn by_id(AppPath(id): AppPath<Uuid>) -> String {
        id.to_string()
    }

    async fn paged(AppQuery(paging): AppQuery<Paging>) -> String {
        paging.page.unwrap_or(1).to_string()
    }

    fn app() -> Router {
        Router::new()
            .route("/items", get(paged))
            .route("/items/{id}", get(by_id))
    }

    async fn call(uri: &str) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, content_type, body)
    }

    #[tokio::test]
    async fn malformed_path_id_is_an_enveloped_validation_error() {
        let (status, content_type, body) = call("/items/not-a-uuid").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("not-a-uuid"));
    }

    #[tokio::test]
    async fn malformed_query_is_an_enveloped_validation_error() {
        let (status, content_type, body) = call("/items?page=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn well_formed_values_pass_through() {
        let id = Uuid::new_v4();
        let response = app()
            .oneshot(
                Request::get(format!("/items/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, _, _) = call("/items?page=3").await;
        assert_eq!(status, StatusCode::OK);
    }
}
