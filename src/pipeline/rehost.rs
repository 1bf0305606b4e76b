//! Media rehosting: download a remote resource and re-upload it through a
//! fallback chain of upload backends.
//!
//! Each call owns its temporary files. They are [`NamedTempFile`]s held on the
//! stack, so they are removed on every exit path, including when the future is
//! dropped mid-flight by a deadline or cancellation.

use super::convert::AttributeResolver;
use super::media::{sniff_content_type, temp_media_file, transcode_webp_to_png};
use crate::backend::MediaUploader;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, MediaError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Downloads, optionally transcodes, and re-uploads media resources.
///
/// Cheap to share behind an [`Arc`]; the semaphore bounds concurrent rehost
/// calls across every branch of a document.
pub struct MediaRehoster {
    http: reqwest::Client,
    uploaders: Vec<Arc<dyn MediaUploader>>,
    retry: RetryPolicy,
    max_bytes: u64,
    temp_dir: Option<PathBuf>,
    permits: Semaphore,
}

impl MediaRehoster {
    /// Build a rehoster whose uploads try `uploaders` in order.
    pub fn new(
        config: &ArchiveConfig,
        uploaders: Vec<Arc<dyn MediaUploader>>,
    ) -> Result<Self, ArchiveError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()
            .map_err(|e| ArchiveError::Internal(format!("media HTTP client: {e}")))?;
        Ok(Self {
            http,
            uploaders,
            retry: RetryPolicy::from_config(config),
            max_bytes: config.max_download_bytes,
            temp_dir: config.temp_dir.clone(),
            permits: Semaphore::new(config.media_concurrency.max(1)),
        })
    }

    /// Rehost the resource at `url` and return its new URL with a provenance
    /// parameter.
    ///
    /// `data:` URIs are returned unchanged.
    pub async fn rehost(&self, url: &str) -> Result<String, MediaError> {
        if is_data_uri(url) {
            return Ok(url.to_string());
        }
        let parsed = parse_media_url(url)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MediaError::Io(std::io::Error::other(e)))?;

        let download = self
            .retry
            .retry(&format!("download {url}"), || self.download(&parsed))
            .await?;

        let bytes = match tokio::fs::read(download.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FileNotFound {
                    path: download.path().to_path_buf(),
                })
            }
            Err(e) => return Err(MediaError::Io(e)),
        };
        let content_type = sniff_content_type(&bytes);

        let transcoded = if content_type == "image/webp" {
            match transcode_webp_to_png(bytes, self.temp_dir.clone()).await {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("webp transcode of {} failed, uploading original: {}", url, e);
                    None
                }
            }
        } else {
            None
        };
        let (path, content_type) = match &transcoded {
            Some(file) => (file.path(), "image/png"),
            None => (download.path(), content_type),
        };

        let urls = self.upload_with_type(path, content_type).await;
        match urls.into_iter().next() {
            Some(rehosted) => {
                debug!("rehosted {} => {}", url, rehosted);
                Ok(with_provenance(&rehosted, url))
            }
            None => Err(MediaError::UploadFailed {
                path: path.to_path_buf(),
                reason: format!("no backend of {} accepted the file", self.uploaders.len()),
            }),
        }
    }

    /// Upload a local file through the backend chain.
    ///
    /// Returns every URL the first successful backend reported. An empty list
    /// means every backend failed.
    pub async fn upload_file(&self, path: &Path) -> Vec<String> {
        let content_type = match read_head(path).await {
            Ok(head) => sniff_content_type(&head),
            Err(e) => {
                warn!("cannot read {} for upload: {}", path.display(), e);
                return Vec::new();
            }
        };
        self.upload_with_type(path, content_type).await
    }

    async fn upload_with_type(&self, path: &Path, content_type: &str) -> Vec<String> {
        for uploader in &self.uploaders {
            let label = format!("{} upload {}", uploader.name(), path.display());
            match self
                .retry
                .retry(&label, || uploader.upload(path, content_type))
                .await
            {
                Ok(urls) if !urls.is_empty() => return urls,
                Ok(_) => warn!("{}: backend returned no paths", label),
                Err(e) => warn!("{}: {}", label, e),
            }
        }
        Vec::new()
    }

    async fn download(&self, url: &Url) -> Result<NamedTempFile, MediaError> {
        let failed = |reason: String, transient: bool| MediaError::DownloadFailed {
            url: url.to_string(),
            reason,
            transient,
        };

        let mut response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(e.to_string(), e.is_timeout() || e.is_connect()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(
                format!("HTTP {status}"),
                status.as_u16() == 429 || status.is_server_error(),
            ));
        }
        if let Some(len) = response.content_length() {
            if len > self.max_bytes {
                return Err(failed(
                    format!("{len} bytes exceeds limit of {}", self.max_bytes),
                    false,
                ));
            }
        }

        let file = temp_media_file(self.temp_dir.as_deref(), "")?;
        let mut out = tokio::fs::File::create(file.path()).await?;
        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| failed(e.to_string(), e.is_timeout()))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(failed(
                    format!("body exceeds limit of {} bytes", self.max_bytes),
                    false,
                ));
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;
        debug!("downloaded {} ({} bytes)", url, written);
        Ok(file)
    }
}

#[async_trait]
impl AttributeResolver for MediaRehoster {
    async fn resolve(&self, value: &str) -> Option<String> {
        if is_data_uri(value) {
            return None;
        }
        match self.rehost(value).await {
            Ok(rehosted) => Some(rehosted),
            Err(e) => {
                warn!("keeping original media link {}: {}", value, e);
                None
            }
        }
    }
}

/// Append the original URL as the `orig` query parameter.
pub fn with_provenance(rehosted: &str, original: &str) -> String {
    let separator = if rehosted.contains('?') { '&' } else { '?' };
    format!("{rehosted}{separator}orig={original}")
}

fn is_data_uri(value: &str) -> bool {
    value
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn parse_media_url(url: &str) -> Result<Url, MediaError> {
    let invalid = |reason: String| MediaError::InvalidUrl {
        url: url.to_string(),
        reason,
    };
    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(parsed),
        scheme => Err(invalid(format!("unsupported scheme '{scheme}'"))),
    }
}

async fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut file = tokio::fs::File::open(path).await?;
    let mut head = vec![0u8; 64];
    let n = file.read(&mut head).await?;
    head.truncate(n);
    Ok(head)
}
