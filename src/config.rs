//! Configuration types for archiving web pages.
//!
//! All archiving behaviour is controlled through [`ArchiveConfig`], built via
//! its [`ArchiveConfigBuilder`]. One struct holds every knob so a config can
//! be shared across concurrent publish jobs and logged as a whole.

use crate::error::ArchiveError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Environment variable that switches on debug-level logging.
pub const DEBUG_ENV: &str = "DEBUG";

/// Environment variable holding the ImgBB API key for the secondary image host.
pub const IMGBB_KEY_ENV: &str = "IMGBB_API_KEY";

/// Returns `true` when `DEBUG` is set to `true`, `1` or `on`.
pub fn debug_requested() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "on"
    )
}

/// Options forwarded to the render/capture service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Device scale factor for the screenshot. Default: 1.0.
    pub scale_factor: f64,
    /// Also return the raw HTML of the rendered page. Default: true.
    pub raw_html: bool,
    /// Screenshot quality (1–100). Default: 100.
    pub quality: u8,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            raw_html: true,
            quality: 100,
        }
    }
}

/// Configuration for archiving pages to Telegraph.
///
/// Built via [`ArchiveConfig::builder()`] or using [`ArchiveConfig::default()`].
///
/// # Example
/// ```rust
/// use telegraph_wayback::ArchiveConfig;
///
/// let config = ArchiveConfig::builder()
///     .batch_capture_timeout_secs(60)
///     .media_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.media_concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ArchiveConfig {
    /// Shared deadline for capturing every URL of a batch. Default: 120.
    pub batch_capture_timeout_secs: u64,

    /// Per-document deadline for conversion and publishing. Default: None.
    ///
    /// Publishing is not bound by the capture deadline; a document with many
    /// images can legitimately take minutes.
    pub publish_timeout_secs: Option<u64>,

    /// Timeout of a single media download request in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Largest media file that will be downloaded. Default: 20 MiB.
    pub max_download_bytes: u64,

    /// Concurrent media rehost calls per document. Default: 8.
    pub media_concurrency: usize,

    /// Retries for idempotent network calls. Default: 10.
    pub max_retries: u32,

    /// Total time budget for one retried operation in seconds. Default: 300.
    pub max_elapsed_secs: u64,

    /// Initial retry delay in milliseconds; doubles per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Ceiling for a single retry delay in milliseconds. Default: 30 000.
    pub max_backoff_ms: u64,

    /// Screenshots taller than this are cut into slices. Default: Some(8000).
    ///
    /// Telegraph refuses images taller than roughly 9000 px.
    pub screenshot_split_height: Option<u32>,

    /// Author name attached to every page. Default: "Source".
    pub author_name: String,

    /// `short_name` of the anonymous account. Default: "telegraph-go".
    pub account_short_name: String,

    /// Author name of the anonymous account. Default: "Anonymous".
    pub account_author_name: String,

    /// Author URL of the anonymous account. Default: "https://example.org".
    pub account_author_url: String,

    /// Base URL of the Telegraph API. Default: "https://api.telegra.ph".
    pub telegraph_api_url: String,

    /// Base URL of the Telegraph upload endpoint. Default: "https://telegra.ph".
    pub telegraph_upload_url: String,

    /// ImgBB upload endpoint. Default: "https://api.imgbb.com/1/upload".
    pub imgbb_api_url: String,

    /// ImgBB API key. Default: `$IMGBB_API_KEY`. Without one the secondary host is skipped.
    pub imgbb_api_key: Option<String>,

    /// Directory for downloaded and derived media. Default: system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Options forwarded to the capturer.
    pub capture: CaptureOptions,

    /// Optional progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            batch_capture_timeout_secs: 120,
            publish_timeout_secs: None,
            download_timeout_secs: 60,
            max_download_bytes: 20 * 1024 * 1024,
            media_concurrency: 8,
            max_retries: 10,
            max_elapsed_secs: 300,
            retry_backoff_ms: 500,
            max_backoff_ms: 30_000,
            screenshot_split_height: Some(8000),
            author_name: "Source".to_string(),
            account_short_name: "telegraph-go".to_string(),
            account_author_name: "Anonymous".to_string(),
            account_author_url: "https://example.org".to_string(),
            telegraph_api_url: "https://api.telegra.ph".to_string(),
            telegraph_upload_url: "https://telegra.ph".to_string(),
            imgbb_api_url: "https://api.imgbb.com/1/upload".to_string(),
            imgbb_api_key: std::env::var(IMGBB_KEY_ENV).ok().filter(|k| !k.is_empty()),
            temp_dir: None,
            capture: CaptureOptions::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("batch_capture_timeout_secs", &self.batch_capture_timeout_secs)
            .field("publish_timeout_secs", &self.publish_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("max_download_bytes", &self.max_download_bytes)
            .field("media_concurrency", &self.media_concurrency)
            .field("max_retries", &self.max_retries)
            .field("max_elapsed_secs", &self.max_elapsed_secs)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("screenshot_split_height", &self.screenshot_split_height)
            .field("author_name", &self.author_name)
            .field("telegraph_api_url", &self.telegraph_api_url)
            .field("telegraph_upload_url", &self.telegraph_upload_url)
            .field("imgbb_api_url", &self.imgbb_api_url)
            .field("imgbb_api_key", &self.imgbb_api_key.as_ref().map(|_| "<redacted>"))
            .field("temp_dir", &self.temp_dir)
            .field("capture", &self.capture)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ArchiveProgressCallback>"),
            )
            .finish()
    }
}

impl ArchiveConfig {
    /// Create a new builder for `ArchiveConfig`.
    pub fn builder() -> ArchiveConfigBuilder {
        ArchiveConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ArchiveConfig`].
#[derive(Debug)]
pub struct ArchiveConfigBuilder {
    config: ArchiveConfig,
}

impl ArchiveConfigBuilder {
    pub fn batch_capture_timeout_secs(mut self, secs: u64) -> Self {
        self.config.batch_capture_timeout_secs = secs;
        self
    }

    pub fn publish_timeout_secs(mut self, secs: u64) -> Self {
        self.config.publish_timeout_secs = Some(secs);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_download_bytes(mut self, bytes: u64) -> Self {
        self.config.max_download_bytes = bytes;
        self
    }

    pub fn media_concurrency(mut self, n: usize) -> Self {
        self.config.media_concurrency = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn max_elapsed_secs(mut self, secs: u64) -> Self {
        self.config.max_elapsed_secs = secs;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn screenshot_split_height(mut self, height: Option<u32>) -> Self {
        self.config.screenshot_split_height = height;
        self
    }

    pub fn author_name(mut self, name: impl Into<String>) -> Self {
        self.config.author_name = name.into();
        self
    }

    pub fn telegraph_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.telegraph_api_url = url.into();
        self
    }

    pub fn telegraph_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.telegraph_upload_url = url.into();
        self
    }

    pub fn imgbb_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.imgbb_api_url = url.into();
        self
    }

    pub fn imgbb_api_key(mut self, key: Option<String>) -> Self {
        self.config.imgbb_api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    pub fn capture(mut self, options: CaptureOptions) -> Self {
        self.config.capture = options;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ArchiveConfig, ArchiveError> {
        let c = &self.config;
        if c.batch_capture_timeout_secs == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Capture timeout must be ≥ 1s".into(),
            ));
        }
        if c.media_concurrency == 0 {
            return Err(ArchiveError::InvalidConfig(
                "Media concurrency must be ≥ 1".into(),
            ));
        }
        if c.publish_timeout_secs == Some(0) {
            return Err(ArchiveError::InvalidConfig(
                "Publish timeout must be ≥ 1s".into(),
            ));
        }
        if c.screenshot_split_height == Some(0) {
            return Err(ArchiveError::InvalidConfig(
                "Screenshot split height must be ≥ 1px".into(),
            ));
        }
        if !(1..=100).contains(&c.capture.quality) {
            return Err(ArchiveError::InvalidConfig(format!(
                "Capture quality must be 1–100, got {}",
                c.capture.quality
            )));
        }
        for (name, value) in [
            ("telegraph_api_url", &c.telegraph_api_url),
            ("telegraph_upload_url", &c.telegraph_upload_url),
            ("imgbb_api_url", &c.imgbb_api_url),
        ] {
            if url::Url::parse(value).is_err() {
                return Err(ArchiveError::InvalidConfig(format!(
                    "{name} is not a valid URL: '{value}'"
                )));
            }
        }
        Ok(self.config)
    }
}
