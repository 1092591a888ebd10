//! Cloudinary media re-hosting
//!
//! Downloads a source asset and uploads it with a signed request. Uploads
//! keep the source file name and overwrite, so re-hosting the same asset on
//! every cycle does not pile up copies.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::errors::ClientError;
use crate::domain::services::MediaRehoster;
use crate::infrastructure::config::MediaConfig;
use crate::infrastructure::http_client::HttpClient;

const FALLBACK_FILE_NAME: &str = "asset.jpg";

/// Lower-case hex SHA-1 of `k1=v1&k2=v2...` (key order) followed by the secret
pub fn sign_upload(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

pub struct CloudinaryUploader {
    http: HttpClient,
    config: MediaConfig,
}

impl CloudinaryUploader {
    pub fn new(http: HttpClient, config: MediaConfig) -> Self {
        Self {
            http: http.with_context_label("cloudinary"),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/{}/auto/upload",
            self.config.api_base_url.trim_end_matches('/'),
            self.config.cloud_name
        )
    }

    fn signed_params(&self, timestamp: i64) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("folder", self.config.folder.clone());
        params.insert("overwrite", "true".to_string());
        params.insert("timestamp", timestamp.to_string());
        params.insert("unique_filename", "false".to_string());
        params.insert("use_filename", "true".to_string());
        params
    }
}

/// Last path segment of the URL, without query string
fn file_name_of(source_url: &str) -> String {
    url::Url::parse(source_url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[async_trait]
impl MediaRehoster for CloudinaryUploader {
    async fn rehost(&self, source_url: &str) -> Result<String, ClientError> {
        let (bytes, content_type) = self.http.fetch_bytes(source_url).await?;

        let mut file = Part::bytes(bytes).file_name(file_name_of(source_url));
        if let Some(content_type) = content_type {
            file = file.mime_str(&content_type)?;
        }

        let params = self.signed_params(Utc::now().timestamp());
        let signature = sign_upload(&params, &self.config.api_secret);

        let mut form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature);
        for (key, value) in params {
            form = form.text(key, value);
        }

        let request = self.http.post(&self.upload_url()).multipart(form);
        let response = self.http.send_expecting(request, StatusCode::OK).await?;
        let uploaded: UploadResponse = HttpClient::read_json(response).await?;

        let secure_url = uploaded
            .secure_url
            .ok_or_else(|| ClientError::decode("upload response has no secure_url"))?;
        debug!("☁️ Re-hosted {} as {}", source_url, secure_url);
        Ok(secure_url)
    }
}
