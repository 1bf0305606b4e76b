//! imgbb image host, used as the fallback uploader.

use super::{read_json, read_upload, MediaUploader};
use crate::error::BackendError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::multipart::Form;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "imgbb";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Uploads images to imgbb with an API key.
#[derive(Debug, Clone)]
pub struct ImgbbClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ImgbbClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl MediaUploader for ImgbbClient {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn upload(&self, path: &Path, _content_type: &str) -> Result<Vec<String>, BackendError> {
        let bytes = read_upload(BACKEND, path).await?;
        debug!("[imgbb] uploading {} ({} bytes)", path.display(), bytes.len());

        let form = Form::new().text("image", STANDARD.encode(&bytes));
        let response = self
            .http
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;

        let body: UploadResponse = read_json(BACKEND, response).await?;
        match body {
            UploadResponse {
                success: true,
                data: Some(data),
                ..
            } => Ok(vec![data.url]),
            UploadResponse {
                error: Some(err), ..
            } => Err(BackendError::Api {
                backend: BACKEND,
                message: err.message,
            }),
            _ => Ok(Vec::new()),
        }
    }
}
