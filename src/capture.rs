//! Page capture: the render/screenshot step in front of publishing.
//!
//! Rendering a page in a browser is left to an external service reached
//! through the [`Capturer`] trait. [`HttpCapturer`] is the built-in fallback: it
//! fetches the raw HTML over HTTP and produces no screenshot.

use crate::config::{ArchiveConfig, CaptureOptions};
use crate::error::ArchiveError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Captured bytes, either in memory or on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureData {
    Inline(Vec<u8>),
    File(PathBuf),
}

impl CaptureData {
    /// Load the bytes, reading the file if needed.
    pub async fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            CaptureData::Inline(bytes) => Ok(bytes.clone()),
            CaptureData::File(path) => tokio::fs::read(path).await,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CaptureData::Inline(bytes) => bytes.is_empty(),
            CaptureData::File(path) => path.as_os_str().is_empty(),
        }
    }
}

/// Result of capturing one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPage {
    /// Final URL of the captured page.
    pub url: String,
    /// Page title as rendered; may be blank.
    pub title: String,
    /// Raw HTML of the page.
    pub html: Option<CaptureData>,
    /// Content-Type of the HTML response, used as a charset hint.
    pub content_type: Option<String>,
    /// Full-page screenshot.
    pub image: Option<CaptureData>,
}

impl CapturedPage {
    /// `true` when there is nothing to publish.
    pub fn is_empty(&self) -> bool {
        let has = |data: &Option<CaptureData>| data.as_ref().is_some_and(|d| !d.is_empty());
        self.url.trim().is_empty() || (!has(&self.html) && !has(&self.image))
    }
}

/// Render/capture service.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture(&self, url: &Url, opts: &CaptureOptions) -> Result<CapturedPage, ArchiveError>;
}

/// Fetches raw HTML without rendering.
#[derive(Debug, Clone)]
pub struct HttpCapturer {
    http: reqwest::Client,
    max_bytes: u64,
}

impl HttpCapturer {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ArchiveError::Internal(format!("capture HTTP client: {e}")))?;
        Ok(Self { http, max_bytes })
    }

    pub fn from_config(config: &ArchiveConfig) -> Result<Self, ArchiveError> {
        Self::new(
            Duration::from_secs(config.batch_capture_timeout_secs),
            config.max_download_bytes,
        )
    }
}

#[async_trait]
impl Capturer for HttpCapturer {
    async fn capture(&self, url: &Url, opts: &CaptureOptions) -> Result<CapturedPage, ArchiveError> {
        let failed = |reason: String| ArchiveError::CaptureFailed {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }
        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(failed(format!("page exceeds {} bytes", self.max_bytes)));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        if body.len() as u64 > self.max_bytes {
            return Err(failed(format!("page exceeds {} bytes", self.max_bytes)));
        }
        debug!("captured {} ({} bytes, raw_html={})", final_url, body.len(), opts.raw_html);

        Ok(CapturedPage {
            url: final_url,
            title: String::new(),
            html: Some(CaptureData::Inline(body.to_vec())),
            content_type,
            image: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn empty_capture_detection() {
        let mut page = CapturedPage {
            url: "https://example.org".into(),
            ..Default::default()
        };
        assert!(page.is_empty());

        page.image = Some(CaptureData::File(PathBuf::from("/tmp/shot.png")));
        assert!(!page.is_empty());

        page.url.clear();
        assert!(page.is_empty());

        let html_only = CapturedPage {
            url: "https://example.org".into(),
            html: Some(CaptureData::Inline(b"<p>x</p>".to_vec())),
            ..Default::default()
        };
        assert!(!html_only.is_empty());
    }

    #[tokio::test]
    async fn http_capturer_returns_html_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><title>T</title><body>b</body></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let capturer = HttpCapturer::new(Duration::from_secs(5), 1024).unwrap();
        let url = Url::parse(&format!("{}/post", server.uri())).unwrap();
        let page = capturer.capture(&url, &CaptureOptions::default()).await.unwrap();

        assert_eq!(page.content_type.as_deref(), Some("text/html; charset=utf-8"));
        assert!(page.image.is_none());
        let html = page.html.unwrap().read().await.unwrap();
        assert!(String::from_utf8(html).unwrap().contains("<title>T</title>"));
    }

    #[tokio::test]
    async fn http_error_is_capture_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let capturer = HttpCapturer::new(Duration::from_secs(5), 1024).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        let err = capturer.capture(&url, &CaptureOptions::default()).await.unwrap_err();
        assert!(matches!(err, ArchiveError::CaptureFailed { .. }));
    }
}
