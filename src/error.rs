//! Error types for the telegraph-wayback library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ArchiveError`]: **Fatal** for a batch or for one document: no valid
//!   URLs, capture deadline, empty title, page create/edit rejected. Returned as
//!   `Err(ArchiveError)` from [`crate::Archiver`] and [`crate::PagePublisher`].
//!
//! * [`MediaError`]: **Non-fatal**: a single embedded resource could not be
//!   rehosted. The document converter logs it and keeps the original link, so
//!   one dead image never costs the whole article.
//!
//! * [`BackendError`]: a single call to the publishing backend or an image
//!   host failed. It carries a transient flag so [`crate::retry::RetryPolicy`]
//!   knows whether repeating the call can help.

use crate::retry::Retryable;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the telegraph-wayback library.
#[derive(Debug, Error)]
pub enum ArchiveError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input string is not an absolute HTTP/HTTPS URL.
    #[error("Invalid URL '{input}': {reason}")]
    InvalidUrl { input: String, reason: String },

    /// Every URL in the batch was rejected by validation.
    #[error("No valid URLs in batch of {total}")]
    NoValidUrls { total: usize },

    // ── Capture errors ────────────────────────────────────────────────────
    /// The shared capture deadline elapsed before all pages were captured.
    #[error("Capture deadline of {secs}s exceeded")]
    CaptureDeadlineExceeded { secs: u64 },

    /// The render/capture service failed for a URL.
    #[error("Capture failed for '{url}': {reason}")]
    CaptureFailed { url: String, reason: String },

    /// Capture succeeded but returned nothing that could be published.
    #[error("Captured data is empty for '{url}'")]
    EmptyCapturedData { url: String },

    // ── Publish errors ────────────────────────────────────────────────────
    /// The page title was empty at publish time.
    #[error("Title is required")]
    TitleRequired,

    /// Could not create the anonymous publishing account.
    #[error("Failed to create publishing account: {0}")]
    AccountFailed(#[source] BackendError),

    /// Page creation failed with both the title and the fallback slug.
    #[error("Failed to create page '{title}': {source}")]
    PageCreateFailed {
        title: String,
        #[source]
        source: BackendError,
    },

    /// Page was created but attaching author metadata failed.
    #[error("Failed to edit page '{path}': {source}")]
    PageEditFailed {
        path: String,
        #[source]
        source: BackendError,
    },

    /// The per-document publish deadline elapsed.
    #[error("Publishing '{url}' timed out after {secs}s")]
    PublishTimeout { url: String, secs: u64 },

    /// The operation was cancelled through the archiver's cancellation token.
    #[error("Archiving cancelled")]
    Cancelled,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single media resource.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The attribute value is not a well-formed absolute URL.
    #[error("invalid media URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Fetching the resource failed.
    #[error("download of '{url}' failed: {reason}")]
    DownloadFailed {
        url: String,
        reason: String,
        transient: bool,
    },

    /// The downloaded file disappeared before its type could be sniffed.
    #[error("media file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Every upload backend in the chain failed.
    #[error("upload of {path} failed on every backend: {reason}")]
    UploadFailed { path: PathBuf, reason: String },

    /// Decoding or re-encoding an image failed.
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    /// Local I/O on a temporary file failed.
    #[error("temporary file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for MediaError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            MediaError::DownloadFailed {
                transient: true,
                ..
            }
        )
    }
}

/// A failed call to the publishing backend or an image host.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Network-level failure (connect, timeout, reset).
    #[error("{backend}: transport error: {message}")]
    Transport {
        backend: &'static str,
        message: String,
        transient: bool,
    },

    /// HTTP status outside 2xx.
    #[error("{backend}: HTTP {status}")]
    Status { backend: &'static str, status: u16 },

    /// The API answered but rejected the request (e.g. `TITLE_INVALID`).
    #[error("{backend}: {message}")]
    Api {
        backend: &'static str,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("{backend}: malformed response: {message}")]
    Malformed {
        backend: &'static str,
        message: String,
    },

    /// Reading the local file to upload failed.
    #[error("{backend}: cannot read {path}: {message}")]
    LocalFile {
        backend: &'static str,
        path: PathBuf,
        message: String,
    },
}

impl BackendError {
    /// Map a `reqwest` error, treating timeouts and connection failures as transient.
    pub(crate) fn from_reqwest(backend: &'static str, err: reqwest::Error) -> Self {
        let transient = err.is_timeout() || err.is_connect() || err.is_request();
        BackendError::Transport {
            backend,
            message: err.to_string(),
            transient,
        }
    }
}

impl Retryable for BackendError {
    fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport { transient, .. } => *transient,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            BackendError::Api { .. }
            | BackendError::Malformed { .. }
            | BackendError::LocalFile { .. } => false,
        }
    }
}
