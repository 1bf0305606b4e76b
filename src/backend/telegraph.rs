//! Telegraph API client: account, pages and media upload.
//!
//! Every API method answers with the envelope
//! `{"ok": true, "result": …}` or `{"ok": false, "error": "TITLE_INVALID"}`.
//! Page content travels as a JSON-encoded node array in a form field.
//! Uploads go to a separate host and return `[{"src": "/file/…"}]`.

use super::{file_name, read_json, read_upload, Author, MediaUploader, Page, PublishingBackend};
use crate::config::ArchiveConfig;
use crate::error::BackendError;
use crate::node::DocumentNode;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const BACKEND: &str = "telegraph";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, BackendError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(BackendError::Malformed {
                backend: BACKEND,
                message: "ok response without result".into(),
            }),
            (false, _) => Err(BackendError::Api {
                backend: BACKEND,
                message: self.error.unwrap_or_else(|| "unknown error".into()),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Account {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UploadResponse {
    Files(Vec<UploadedFile>),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    src: String,
}

/// Client for one anonymous Telegraph account.
///
/// Created once per top-level archive call via [`TelegraphClient::create_account`]
/// and shared by every publish job of that call.
#[derive(Debug, Clone)]
pub struct TelegraphClient {
    http: reqwest::Client,
    api_url: String,
    upload_url: String,
    access_token: String,
}

impl TelegraphClient {
    /// Wrap an existing access token.
    pub fn new(
        http: reqwest::Client,
        api_url: impl Into<String>,
        upload_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Create a fresh anonymous account and return a client bound to it.
    pub async fn create_account(config: &ArchiveConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;
        let api_url = config.telegraph_api_url.trim_end_matches('/');

        let response = http
            .post(format!("{api_url}/createAccount"))
            .form(&[
                ("short_name", config.account_short_name.as_str()),
                ("author_name", config.account_author_name.as_str()),
                ("author_url", config.account_author_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;

        let account: Account = read_json::<Envelope<Account>>(BACKEND, response)
            .await?
            .into_result()?;
        debug!("[telegraph] created account {}", config.account_short_name);

        Ok(Self::new(
            http,
            api_url,
            config.telegraph_upload_url.as_str(),
            account.access_token,
        ))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    fn encode_content(content: &[DocumentNode]) -> Result<String, BackendError> {
        serde_json::to_string(content).map_err(|e| BackendError::Malformed {
            backend: BACKEND,
            message: format!("cannot encode content: {e}"),
        })
    }

    fn absolute(&self, src: &str) -> String {
        if src.starts_with("http://") || src.starts_with("https://") {
            src.to_string()
        } else {
            format!("{}/{}", self.upload_url, src.trim_start_matches('/'))
        }
    }
}

#[async_trait]
impl PublishingBackend for TelegraphClient {
    async fn create_page(
        &self,
        title: &str,
        content: &[DocumentNode],
    ) -> Result<Page, BackendError> {
        let content = Self::encode_content(content)?;
        debug!("[telegraph] createPage '{}' ({} bytes)", title, content.len());
        let response = self
            .http
            .post(format!("{}/createPage", self.api_url))
            .form(&[
                ("access_token", self.access_token.as_str()),
                ("title", title),
                ("content", content.as_str()),
                ("return_content", "false"),
            ])
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;
        read_json::<Envelope<Page>>(BACKEND, response)
            .await?
            .into_result()
    }

    async fn edit_page(
        &self,
        path: &str,
        title: &str,
        content: &[DocumentNode],
        author: &Author,
    ) -> Result<Page, BackendError> {
        let content = Self::encode_content(content)?;
        debug!("[telegraph] editPage '{}'", path);
        let response = self
            .http
            .post(format!("{}/editPage/{}", self.api_url, path))
            .form(&[
                ("access_token", self.access_token.as_str()),
                ("title", title),
                ("content", content.as_str()),
                ("author_name", author.name.as_str()),
                ("author_url", author.url.as_str()),
                ("return_content", "false"),
            ])
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;
        read_json::<Envelope<Page>>(BACKEND, response)
            .await?
            .into_result()
    }
}

#[async_trait]
impl MediaUploader for TelegraphClient {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn upload(&self, path: &Path, content_type: &str) -> Result<Vec<String>, BackendError> {
        let bytes = read_upload(BACKEND, path).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name(path))
            .mime_str(content_type)
            .map_err(|e| BackendError::Malformed {
                backend: BACKEND,
                message: format!("bad content type '{content_type}': {e}"),
            })?;
        let response = self
            .http
            .post(format!("{}/upload", self.upload_url))
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(BACKEND, e))?;

        match read_json::<UploadResponse>(BACKEND, response).await? {
            UploadResponse::Files(files) => {
                Ok(files.iter().map(|f| self.absolute(&f.src)).collect())
            }
            UploadResponse::Error { error } => Err(BackendError::Api {
                backend: BACKEND,
                message: error,
            }),
        }
    }
}
