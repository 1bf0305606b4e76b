//! Page assembly and publication.
//!
//! ## Layout
//!
//! Without article text the page is a gallery: one paragraph of `<img>`
//! elements, one per screenshot slice. With article text the page opens with
//! an `<em>` line of numbered links to the screenshot slices, then a `<br>`,
//! then the converted article wrapped in a single `<p>`.
//!
//! ## Page creation
//!
//! `createPage` is not idempotent, so it is never retried through
//! [`crate::retry::RetryPolicy`]. When the backend rejects the title, the page
//! is created once more under a random six-character slug; the real title is
//! then restored by `editPage` and appended to the returned URL as `?title=`.

use crate::backend::{Author, Page, PublishingBackend};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, BackendError};
use crate::node::{DocumentNode, NodeElement};
use crate::output::PublishedPage;
use crate::pipeline::convert::{AttributeResolver, DocumentConverter};
use crate::pipeline::media::{split_screenshot, ScreenshotSlices};
use crate::pipeline::rehost::MediaRehoster;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Longest title accepted by the backend, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

const SLUG_LEN: usize = 6;

/// Characters escaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'/')
    .add(b';')
    .add(b',')
    .add(b'?')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// What a page is about: its title and the URL it archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub title: String,
    pub source: String,
}

impl Subject {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
        }
    }
}

/// Builds node trees and publishes them as pages.
pub struct PagePublisher {
    backend: Arc<dyn PublishingBackend>,
    rehoster: Arc<MediaRehoster>,
    author_name: String,
    split_height: Option<u32>,
    temp_dir: Option<PathBuf>,
    concurrency: usize,
}

impl PagePublisher {
    pub fn new(
        config: &ArchiveConfig,
        backend: Arc<dyn PublishingBackend>,
        rehoster: Arc<MediaRehoster>,
    ) -> Self {
        Self {
            backend,
            rehoster,
            author_name: config.author_name.clone(),
            split_height: config.screenshot_split_height,
            temp_dir: config.temp_dir.clone(),
            concurrency: config.media_concurrency,
        }
    }

    /// Publish `subject` with an optional article body and screenshot.
    ///
    /// Returns [`ArchiveError::TitleRequired`] before any network call when the
    /// title is empty. A screenshot that cannot be uploaded is left out.
    pub async fn publish(
        &self,
        subject: &Subject,
        body: Option<&str>,
        screenshot: Option<&Path>,
    ) -> Result<PublishedPage, ArchiveError> {
        if subject.title.is_empty() {
            return Err(ArchiveError::TitleRequired);
        }
        let title = truncate_title(&subject.title);

        let shots = match screenshot {
            Some(path) => self.upload_screenshot(path).await,
            None => Vec::new(),
        };

        let content = match body.filter(|b| !b.trim().is_empty()) {
            None => gallery(&shots),
            Some(html) => {
                let base = Url::parse(&subject.source).ok();
                self.article(&shots, html, base).await
            }
        };

        let (page, used_fallback_slug) = self.create(&title, &content).await?;

        let author = Author {
            name: self.author_name.clone(),
            url: subject.source.clone(),
        };
        let page = self
            .backend
            .edit_page(&page.path, &title, &content, &author)
            .await
            .map_err(|source| ArchiveError::PageEditFailed {
                path: page.path.clone(),
                source,
            })?;

        let url = if used_fallback_slug {
            format!(
                "{}?title={}",
                page.url,
                utf8_percent_encode(&title, PATH_SEGMENT)
            )
        } else {
            page.url
        };
        info!("published '{}' => {}", subject.source, url);

        Ok(PublishedPage {
            url,
            path: page.path,
            title,
            used_fallback_slug,
        })
    }

    async fn create(
        &self,
        title: &str,
        content: &[DocumentNode],
    ) -> Result<(Page, bool), ArchiveError> {
        match self.backend.create_page(title, content).await {
            Ok(page) => Ok((page, false)),
            Err(err) if rejects_title(&err) => {
                let slug = random_slug();
                warn!("title '{}' rejected ({}), creating as '{}'", title, err, slug);
                self.backend
                    .create_page(&slug, content)
                    .await
                    .map(|page| (page, true))
                    .map_err(|source| ArchiveError::PageCreateFailed {
                        title: title.to_string(),
                        source,
                    })
            }
            Err(source) => Err(ArchiveError::PageCreateFailed {
                title: title.to_string(),
                source,
            }),
        }
    }

    async fn upload_screenshot(&self, path: &Path) -> Vec<String> {
        let slices = match self.split_height {
            Some(height) => match split_screenshot(path, height, self.temp_dir.clone()).await {
                Ok(slices) => slices,
                Err(e) => {
                    warn!("cannot split screenshot {}: {}", path.display(), e);
                    ScreenshotSlices::Original(path.to_path_buf())
                }
            },
            None => ScreenshotSlices::Original(path.to_path_buf()),
        };

        let mut urls = Vec::new();
        for slice in slices.paths() {
            let uploaded = self.rehoster.upload_file(slice).await;
            if uploaded.is_empty() {
                warn!("screenshot slice {} not uploaded", slice.display());
            }
            urls.extend(uploaded);
        }
        debug!("screenshot {} => {} urls", path.display(), urls.len());
        urls
    }

    async fn article(&self, shots: &[String], html: &str, base: Option<Url>) -> Vec<DocumentNode> {
        let resolver: Arc<dyn AttributeResolver> = self.rehoster.clone();
        let converter = DocumentConverter::new(resolver)
            .with_base_url(base)
            .with_concurrency(self.concurrency);
        let body = converter.convert(html).await;

        let mut nodes = screenshot_links(shots);
        nodes.push(NodeElement::new("p").children(body).into());
        nodes
    }
}

/// First [`MAX_TITLE_CHARS`] characters of `title`.
pub fn truncate_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}

fn gallery(shots: &[String]) -> Vec<DocumentNode> {
    let images: Vec<DocumentNode> = shots
        .iter()
        .map(|src| NodeElement::new("img").attr("src", src).attr("alt", "").into())
        .collect();
    vec![NodeElement::new("p").children(images).into()]
}

fn screenshot_links(shots: &[String]) -> Vec<DocumentNode> {
    if shots.is_empty() {
        return Vec::new();
    }
    let mut em = NodeElement::new("em").child("screenshots: ");
    for (i, href) in shots.iter().enumerate() {
        em = em.child(
            NodeElement::new("a")
                .attr("href", href)
                .attr("target", "_blank")
                .child((i + 1).to_string()),
        );
    }
    vec![em.into(), NodeElement::new("br").into()]
}

fn rejects_title(err: &BackendError) -> bool {
    match err {
        BackendError::Api { .. } => true,
        BackendError::Status { status, .. } => (400..500).contains(status) && *status != 429,
        _ => false,
    }
}

fn random_slug() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SLUG_LEN)
        .map(char::from)
        .collect()
}
