//! Publishing backend and image-host interfaces.
//!
//! Two seams keep the pipeline independent of any concrete service:
//!
//! * [`PublishingBackend`] creates and edits pages (`createPage`, `editPage`).
//! * [`MediaUploader`] uploads one local file and returns its public URLs.
//!
//! [`TelegraphClient`] implements both; [`ImgbbClient`] is the secondary image
//! host. The media rehoster walks an ordered chain of uploaders and stops at
//! the first one that returns at least one URL.

pub mod imgbb;
pub mod telegraph;

pub use imgbb::ImgbbClient;
pub use telegraph::TelegraphClient;

use crate::error::BackendError;
use crate::node::DocumentNode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A page as returned by the publishing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Author metadata attached to a page by `editPage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub url: String,
}

/// Page creation and editing.
#[async_trait]
pub trait PublishingBackend: Send + Sync {
    /// Create a page. Not idempotent: never retry blindly.
    async fn create_page(
        &self,
        title: &str,
        content: &[DocumentNode],
    ) -> Result<Page, BackendError>;

    /// Replace title, content and author metadata of the page at `path`.
    async fn edit_page(
        &self,
        path: &str,
        title: &str,
        content: &[DocumentNode],
        author: &Author,
    ) -> Result<Page, BackendError>;
}

/// Upload of a local media file.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Upload `path` (of MIME type `content_type`) and return its public URLs.
    ///
    /// An empty list means the host accepted the request but stored nothing.
    async fn upload(&self, path: &Path, content_type: &str) -> Result<Vec<String>, BackendError>;
}

/// Check the HTTP status and decode a JSON body.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status {
            backend,
            status: status.as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| BackendError::from_reqwest(backend, e))?;
    serde_json::from_slice(&body).map_err(|e| BackendError::Malformed {
        backend,
        message: e.to_string(),
    })
}

/// Read a local file for upload.
pub(crate) async fn read_upload(backend: &'static str, path: &Path) -> Result<Vec<u8>, BackendError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| BackendError::LocalFile {
            backend,
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Final path segment, used as the multipart file name.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}
