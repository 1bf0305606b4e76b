//! Top-level orchestration: validate, capture, then publish every page.
//!
//! ## Flow of a batch
//!
//! ```text
//! urls ──▶ validate ──▶ createAccount ──▶ capture all ──▶ one task per page
//!            │                           (shared deadline)     │
//!            ▼                                                  ▼
//!      invalid entries                                 publish (own deadline)
//!            └──────────────────▶ BatchReport ◀─────────────────┘
//! ```
//!
//! The capture deadline bounds capture only. Publishing a long article with
//! many images can take far longer, so each publish task gets its own optional
//! deadline ([`ArchiveConfig::publish_timeout_secs`]) instead.
//!
//! Publish tasks are not pooled: one task per captured page is spawned into a
//! [`JoinSet`] and its outcome written into the report when it finishes.
//! Media concurrency inside each task is bounded by the rehoster.

use crate::backend::{ImgbbClient, MediaUploader, PublishingBackend, TelegraphClient};
use crate::capture::{CaptureData, CapturedPage, Capturer, HttpCapturer};
use crate::config::ArchiveConfig;
use crate::error::ArchiveError;
use crate::output::{BatchReport, PublishResult, PublishedPage};
use crate::pipeline::decode::decode_html;
use crate::pipeline::extract::{Extractor, ReadabilityLikeExtractor};
use crate::pipeline::media::temp_media_file;
use crate::pipeline::rehost::MediaRehoster;
use crate::publish::{PagePublisher, Subject};
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Title used when neither the capture nor the extractor found one.
pub const MISSING_TITLE: &str = "Missing Title";

const PENDING: &str = "publish job did not complete";

/// Archives web pages to the publishing backend.
///
/// Every top-level call ([`archive_batch`](Self::archive_batch),
/// [`archive`](Self::archive), [`archive_captured`](Self::archive_captured))
/// creates its own backend account and shares it only with the jobs of that
/// call.
pub struct Archiver {
    config: ArchiveConfig,
    capturer: Arc<dyn Capturer>,
    extractor: Arc<dyn Extractor>,
    backend: Option<Arc<dyn PublishingBackend>>,
    uploaders: Option<Vec<Arc<dyn MediaUploader>>>,
    articles: HashMap<String, String>,
    cancel: CancellationToken,
}

impl Archiver {
    /// An archiver that captures over plain HTTP and publishes to Telegraph.
    pub fn new(config: ArchiveConfig) -> Result<Self, ArchiveError> {
        let capturer = Arc::new(HttpCapturer::from_config(&config)?);
        Ok(Self {
            config,
            capturer,
            extractor: Arc::new(ReadabilityLikeExtractor),
            backend: None,
            uploaders: None,
            articles: HashMap::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Use an external render/capture service.
    pub fn with_capturer(mut self, capturer: Arc<dyn Capturer>) -> Self {
        self.capturer = capturer;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Publish through `backend` instead of a fresh Telegraph account.
    pub fn with_backend(mut self, backend: Arc<dyn PublishingBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the media upload chain.
    pub fn with_uploaders(mut self, uploaders: Vec<Arc<dyn MediaUploader>>) -> Self {
        self.uploaders = Some(uploaders);
        self
    }

    /// Use `html` as the extracted article of `url`, skipping extraction.
    pub fn with_article(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.articles.insert(url.into(), html.into());
        self
    }

    /// Token that aborts in-flight capture and publish work when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Archive every URL of `urls`.
    ///
    /// The report holds one entry per input string. Invalid URLs and per-page
    /// failures are entries, not errors; the call itself fails only when no
    /// URL is valid, the account cannot be created, capture misses its
    /// deadline, or the token is cancelled.
    pub async fn archive_batch(&self, urls: &[String]) -> Result<BatchReport, ArchiveError> {
        let mut report = BatchReport::new();
        let mut valid = Vec::new();
        for input in urls {
            match validate_url(input) {
                Ok(url) => valid.push((input.clone(), url)),
                Err(e) => {
                    warn!("skipping {}", e);
                    report.insert(input.clone(), PublishResult::failed(e.to_string()));
                }
            }
        }
        if valid.is_empty() {
            return Err(ArchiveError::NoValidUrls { total: urls.len() });
        }

        let progress = self.config.progress_callback.clone();
        if let Some(cb) = &progress {
            cb.on_batch_start(valid.len(), report.len());
        }
        for (input, _) in &valid {
            report.insert(input.clone(), PublishResult::failed(PENDING));
        }

        let job = Arc::new(self.connect().await?);

        let deadline = Duration::from_secs(self.config.batch_capture_timeout_secs);
        let captures = self.capture_all(&valid, deadline).await?;

        let mut tasks = JoinSet::new();
        for (input, captured) in captures {
            let page = match captured {
                Ok(page) => page,
                Err(e) => {
                    warn!("capture of {} failed: {}", input, e);
                    report.insert(input, PublishResult::failed(e.to_string()));
                    continue;
                }
            };
            let article = self.article_for(&input, &page);
            let job = Arc::clone(&job);
            let progress = progress.clone();
            tasks.spawn(async move {
                if let Some(cb) = &progress {
                    cb.on_job_start(&input);
                }
                let result = match job.run(page, article).await {
                    Ok(published) => PublishResult::Published { url: published.url },
                    Err(e) => {
                        error!("archiving {} failed: {}", input, e);
                        PublishResult::failed(e.to_string())
                    }
                };
                if let Some(cb) = &progress {
                    cb.on_job_complete(&input, &result);
                }
                (input, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((input, result)) => {
                    report.insert(input, result);
                }
                Err(e) => error!("publish task aborted: {}", e),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(ArchiveError::Cancelled);
        }

        let published = report.values().filter(|r| r.is_published()).count();
        info!(
            "batch done: {} published, {} failed",
            published,
            report.len() - published
        );
        if let Some(cb) = &progress {
            cb.on_batch_complete(published, report.len() - published);
        }
        Ok(report)
    }

    /// Capture and publish a single URL, with `deadline` bounding capture.
    pub async fn archive(&self, url: &str, deadline: Duration) -> Result<PublishedPage, ArchiveError> {
        let parsed = validate_url(url)?;
        let job = self.connect().await?;

        let capture = self.capturer.capture(&parsed, &self.config.capture);
        let page = self
            .cancellable(async {
                match tokio::time::timeout(deadline, capture).await {
                    Ok(result) => result,
                    Err(_) => Err(ArchiveError::CaptureDeadlineExceeded {
                        secs: deadline.as_secs(),
                    }),
                }
            })
            .await?;

        let article = self.article_for(url, &page);
        job.run(page, article).await
    }

    /// Publish a page that was captured elsewhere.
    pub async fn archive_captured(&self, page: CapturedPage) -> Result<PublishedPage, ArchiveError> {
        let job = self.connect().await?;
        let article = self.article_for(&page.url, &page);
        job.run(page, article).await
    }

    /// Create the request-scoped backend and the job context around it.
    async fn connect(&self) -> Result<PublishJob, ArchiveError> {
        let (backend, default_uploaders) = match &self.backend {
            Some(backend) => (Arc::clone(backend), self.secondary_uploaders()?),
            None => {
                let client = Arc::new(
                    self.cancellable(async {
                        TelegraphClient::create_account(&self.config)
                            .await
                            .map_err(ArchiveError::AccountFailed)
                    })
                    .await?,
                );
                let mut uploaders: Vec<Arc<dyn MediaUploader>> = vec![client.clone()];
                uploaders.extend(self.secondary_uploaders()?);
                (client as Arc<dyn PublishingBackend>, uploaders)
            }
        };
        let uploaders = self.uploaders.clone().unwrap_or(default_uploaders);
        debug!("upload chain: {:?}", uploaders.iter().map(|u| u.name()).collect::<Vec<_>>());

        let rehoster = Arc::new(MediaRehoster::new(&self.config, uploaders)?);
        Ok(PublishJob {
            publisher: PagePublisher::new(&self.config, backend, rehoster),
            extractor: Arc::clone(&self.extractor),
            cancel: self.cancel.clone(),
            publish_timeout: self.config.publish_timeout_secs.map(Duration::from_secs),
            temp_dir: self.config.temp_dir.clone(),
        })
    }

    fn secondary_uploaders(&self) -> Result<Vec<Arc<dyn MediaUploader>>, ArchiveError> {
        let Some(key) = &self.config.imgbb_api_key else {
            return Ok(Vec::new());
        };
        let imgbb = ImgbbClient::new(
            self.config.imgbb_api_url.as_str(),
            key.as_str(),
            Duration::from_secs(self.config.download_timeout_secs),
        )
        .map_err(|e| ArchiveError::Internal(format!("imgbb HTTP client: {e}")))?;
        Ok(vec![Arc::new(imgbb)])
    }

    async fn capture_all(
        &self,
        valid: &[(String, Url)],
        deadline: Duration,
    ) -> Result<Vec<(String, Result<CapturedPage, ArchiveError>)>, ArchiveError> {
        let captures = join_all(valid.iter().map(|(input, url)| async move {
            let result = self.capturer.capture(url, &self.config.capture).await;
            (input.clone(), result)
        }));
        self.cancellable(async {
            tokio::time::timeout(deadline, captures).await.map_err(|_| {
                ArchiveError::CaptureDeadlineExceeded {
                    secs: deadline.as_secs(),
                }
            })
        })
        .await
    }

    fn article_for(&self, input: &str, page: &CapturedPage) -> Option<String> {
        self.articles
            .get(input)
            .or_else(|| self.articles.get(&page.url))
            .cloned()
    }

    async fn cancellable<T>(
        &self,
        work: impl Future<Output = Result<T, ArchiveError>>,
    ) -> Result<T, ArchiveError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ArchiveError::Cancelled),
            result = work => result,
        }
    }
}

/// Everything one publish task needs, shared by all tasks of a call.
struct PublishJob {
    publisher: PagePublisher,
    extractor: Arc<dyn Extractor>,
    cancel: CancellationToken,
    publish_timeout: Option<Duration>,
    temp_dir: Option<PathBuf>,
}

impl PublishJob {
    async fn run(
        &self,
        page: CapturedPage,
        article: Option<String>,
    ) -> Result<PublishedPage, ArchiveError> {
        let url = page.url.clone();
        let work = self.publish(page, article);
        let bounded = async {
            match self.publish_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(ArchiveError::PublishTimeout {
                        url,
                        secs: limit.as_secs(),
                    }),
                },
                None => work.await,
            }
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ArchiveError::Cancelled),
            result = bounded => result,
        }
    }

    async fn publish(
        &self,
        page: CapturedPage,
        article: Option<String>,
    ) -> Result<PublishedPage, ArchiveError> {
        if page.is_empty() {
            return Err(ArchiveError::EmptyCapturedData { url: page.url });
        }

        let (extracted_title, content) = match article {
            Some(html) => (None, Some(html)),
            None => self.extract(&page).await,
        };
        let title = [page.title.trim(), extracted_title.as_deref().unwrap_or("").trim()]
            .into_iter()
            .find(|t| !t.is_empty())
            .unwrap_or(MISSING_TITLE)
            .to_string();
        if content.is_none() {
            info!("{}: no article text, publishing as gallery", page.url);
        }

        let screenshot = match &page.image {
            Some(data) => stage_screenshot(data, self.temp_dir.as_deref()).await,
            None => None,
        };

        self.publisher
            .publish(
                &Subject::new(title, page.url.as_str()),
                content.as_deref(),
                screenshot.as_ref().map(|s| s.path()),
            )
            .await
    }

    /// Decode and extract the captured HTML. Failure is not an error: the
    /// page is then published without article text.
    async fn extract(&self, page: &CapturedPage) -> (Option<String>, Option<String>) {
        let Some(data) = &page.html else {
            return (None, None);
        };
        let bytes = match data.read().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("{}: cannot read captured HTML: {}", page.url, e);
                return (None, None);
            }
        };
        let content_type = page.content_type.clone();
        let extractor = Arc::clone(&self.extractor);

        let extracted = tokio::task::spawn_blocking(move || {
            let decoded = decode_html(&bytes, content_type.as_deref());
            extractor.extract(&decoded.html)
        })
        .await;

        match extracted {
            Ok(extracted) => {
                let content = Some(extracted.content_html).filter(|c| !c.trim().is_empty());
                (extracted.title, content)
            }
            Err(e) => {
                warn!("{}: extraction task failed: {}", page.url, e);
                (None, None)
            }
        }
    }
}

/// A screenshot on disk, owned by the job when it had to be written out.
enum StagedScreenshot {
    Existing(PathBuf),
    Temp(NamedTempFile),
}

impl StagedScreenshot {
    fn path(&self) -> &Path {
        match self {
            StagedScreenshot::Existing(path) => path,
            StagedScreenshot::Temp(file) => file.path(),
        }
    }
}

async fn stage_screenshot(data: &CaptureData, dir: Option<&Path>) -> Option<StagedScreenshot> {
    match data {
        CaptureData::File(path) if !path.as_os_str().is_empty() => {
            Some(StagedScreenshot::Existing(path.clone()))
        }
        CaptureData::Inline(bytes) if !bytes.is_empty() => {
            let file = match temp_media_file(dir, ".png") {
                Ok(file) => file,
                Err(e) => {
                    warn!("cannot stage screenshot: {}", e);
                    return None;
                }
            };
            match tokio::fs::write(file.path(), bytes).await {
                Ok(()) => Some(StagedScreenshot::Temp(file)),
                Err(e) => {
                    warn!("cannot stage screenshot: {}", e);
                    None
                }
            }
        }
        _ => None,
    }
}

/// Archive `urls` with a default [`Archiver`] built from `config`.
///
/// Convenience wrapper for callers that need neither injection nor
/// cancellation.
pub async fn archive_batch(
    urls: &[String],
    config: &ArchiveConfig,
) -> Result<BatchReport, ArchiveError> {
    Archiver::new(config.clone())?.archive_batch(urls).await
}

/// Accept only absolute HTTP(S) URLs with a host.
pub fn validate_url(input: &str) -> Result<Url, ArchiveError> {
    let invalid = |reason: String| ArchiveError::InvalidUrl {
        input: input.to_string(),
        reason,
    };
    let url = Url::parse(input.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(url),
        "http" | "https" => Err(invalid("missing host".into())),
        scheme => Err(invalid(format!("unsupported scheme '{scheme}'"))),
    }
}
