//! Externally hosted product images.
//!
//! Uploads happen before a product row links to them, and a failed batch removes whatever
//! it already uploaded. Deletions are best-effort: every image is attempted exactly once
//! and individual failures are only logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::{config::CloudinaryConfig, models::ProductImage};

const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/v1_1";
const UPLOAD_TRANSFORMATION: &str = "c_limit,h_1000,w_1000/q_auto";

/// A file received from a client, not yet hosted anywhere.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostedImage {
    pub external_id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Rejected(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError>;

    async fn delete(&self, external_id: String) -> Result<(), ImageHostError>;
}

/// Upload every file in order. If one fails, the images uploaded so far are deleted
/// before the error is returned.
pub async fn upload_all(
    host: &dyn ImageHost,
    uploads: Vec<ImageUpload>,
    alt_text: &str,
) -> Result<Vec<ProductImage>, ImageHostError> {
    let mut uploaded: Vec<ProductImage> = Vec::with_capacity(uploads.len());

    for upload in uploads {
        let file_name = upload.file_name.clone();
        match host.upload(upload).await {
            Ok(hosted) => {
                tracing::debug!(external_id = %hosted.external_id, file = %file_name, "image uploaded");
                uploaded.push(ProductImage {
                    external_id: hosted.external_id,
                    url: hosted.url,
                    alt_text: alt_text.to_string(),
                });
            }
            Err(err) => {
                tracing::error!(error = %err, file = %file_name, rolled_back = uploaded.len(), "image upload failed");
                delete_all(host, &uploaded).await;
                return Err(err);
            }
        }
    }

    Ok(uploaded)
}

/// Delete each image once, continuing past failures. Returns how many deletions failed.
pub async fn delete_all(host: &dyn ImageHost, images: &[ProductImage]) -> usize {
    let mut failures = 0;
    for image in images {
        if image.external_id.is_empty() {
            continue;
        }
        if let Err(err) = host.delete(image.external_id.clone()).await {
            failures += 1;
            tracing::warn!(error = %err, external_id = %image.external_id, "image delete failed");
        }
    }
    failures
}

/// Cloudinary signature: SHA-1 over the alphabetically sorted `key=value` pairs joined
/// with `&`, followed by the API secret.
pub fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct CloudinaryHost {
    config: CloudinaryConfig,
    http: Client,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Result<Self, ImageHostError> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{CLOUDINARY_API_BASE}/{}/image/{action}",
            self.config.cloud_name
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("folder", self.config.folder.as_str()),
                ("timestamp", timestamp.as_str()),
                ("transformation", UPLOAD_TRANSFORMATION),
            ],
            &self.config.api_secret,
        );

        let file = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.config.folder.clone())
            .text("timestamp", timestamp)
            .text("transformation", UPLOAD_TRANSFORMATION)
            .text("signature", signature);

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Rejected(format!(
                "upload failed with status {status}: {text}"
            )));
        }

        let parsed: UploadResponse = response.json().await?;
        Ok(HostedImage {
            external_id: parsed.public_id,
            url: parsed.secure_url,
        })
    }

    async fn delete(&self, external_id: String) -> Result<(), ImageHostError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[
                ("public_id", external_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.config.api_secret,
        );

        let response = self
            .http
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", external_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ImageHostError::Rejected(format!(
                "destroy failed with status {status}: {text}"
            )));
        }

        let parsed: DestroyResponse = response.json().await?;
        match parsed.result.as_str() {
            // "not found": the asset is already gone.
            "ok" | "not found" => Ok(()),
            other => Err(ImageHostError::Rejected(format!(
                "destroy of {external_id} returned {other}"
            ))),
        }
    }
}
