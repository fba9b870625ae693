//! Image upload relay.
//!
//! Uploaded files are not stored locally. They are forwarded to an external
//! image host, which enforces the allowed formats and applies a size-limiting
//! transform, and the host's URL and identifier are handed back to the
//! client.
//!
//! [`ImageHost`] is the seam: [`CloudinaryHost`] talks to the Cloudinary
//! upload API; tests substitute their own implementation.
//!
//! # Signing
//!
//! Cloudinary authenticates uploads with a signature over the request
//! parameters:
//!
//! ```text
//! to_sign   = "k1=v1&k2=v2&..." (keys sorted, file/api_key excluded) + api_secret
//! signature = hex(sha256(to_sign))
//! ```
//!
//! `signature_algorithm=sha256` is sent alongside so the host verifies with
//! the same digest.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::config::{CloudinaryConfig, UploadConfig};

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Where the host put the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    pub url: String,
    pub id: String,
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<HostedImage>;
}

/// Host-side handling requested for every upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub folder: String,
    pub allowed_formats: Vec<String>,
    pub max_width: u32,
    pub max_height: u32,
}

impl UploadOptions {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            folder: config.folder.clone(),
            allowed_formats: config.allowed_formats.clone(),
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }

    /// Scale down, never up, to fit inside the bounding box.
    pub fn transformation(&self) -> String {
        format!("c_limit,h_{},w_{}", self.max_height, self.max_width)
    }

    /// Signed upload parameters, excluding credentials.
    fn params(&self, timestamp: i64) -> Vec<(&'static str, String)> {
        vec![
            ("allowed_formats", self.allowed_formats.join(",")),
            ("folder", self.folder.clone()),
            ("timestamp", timestamp.to_string()),
            ("transformation", self.transformation()),
        ]
    }
}

pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
    options: UploadOptions,
}

impl CloudinaryHost {
    pub fn new(config: &CloudinaryConfig, upload: &UploadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for image host")?;

        Ok(Self {
            client,
            config: config.clone(),
            options: UploadOptions::from_config(upload),
        })
    }

    fn upload_url(&self, cloud_name: &str) -> String {
        format!(
            "{}/{}/image/upload",
            self.config.api_base.trim_end_matches('/'),
            cloud_name
        )
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, file: UploadFile) -> Result<HostedImage> {
        let (cloud_name, api_key, api_secret) = match (
            self.config.cloud_name.as_deref(),
            self.config.api_key.as_deref(),
            self.config.api_secret.as_deref(),
        ) {
            (Some(n), Some(k), Some(s)) if !n.is_empty() && !k.is_empty() && !s.is_empty() => {
                (n, k, s)
            }
            _ => bail!("image host credentials are not configured"),
        };

        let timestamp = chrono::Utc::now().timestamp();
        let params = self.options.params(timestamp);
        let signature = sign(&params, api_secret);

        let mut part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name.unwrap_or_else(|| "upload".to_string()));
        if let Some(ref content_type) = file.content_type {
            part = part
                .mime_str(content_type)
                .with_context(|| format!("Invalid content type: {}", content_type))?;
        }

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", api_key.to_string())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let resp = self
            .client
            .post(self.upload_url(cloud_name))
            .multipart(form)
            .send()
            .await
            .map_err(|e| anyhow!("Image upload request failed: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(500).collect());
            bail!("Image host rejected upload (HTTP {}): {}", status, message);
        }

        let body: UploadResponse = resp
            .json()
            .await
            .context("Failed to parse image host response")?;

        Ok(HostedImage {
            url: body.secure_url,
            id: body.public_id,
        })
    }
}

/// Parameters sorted by key and joined as `k=v&k=v`, without the secret.
fn string_to_sign(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
