//! In-process fakes for the publishing backend, upload hosts and capturer.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use telegraph_wayback::{
    ArchiveConfig, ArchiveError, Author, BackendError, CaptureOptions, CapturedPage, Capturer,
    DocumentNode, MediaUploader, Page, PublishingBackend,
};
use url::Url;

/// Config with fast retries, suitable for tests.
pub fn fast_config() -> ArchiveConfig {
    ArchiveConfig::builder()
        .max_retries(1)
        .retry_backoff_ms(1)
        .max_backoff_ms(2)
        .imgbb_api_key(None)
        .build()
        .unwrap()
}

/// One call seen by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Create {
        title: String,
        content: Vec<DocumentNode>,
    },
    Edit {
        path: String,
        title: String,
        author: Author,
    },
}

/// Publishing backend that records calls.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    /// Titles `createPage` rejects with `TITLE_INVALID`.
    pub reject_titles: Mutex<Vec<String>>,
    pub fail_edit: bool,
    counter: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_edit() -> Arc<Self> {
        Arc::new(Self {
            fail_edit: true,
            ..Self::default()
        })
    }

    pub fn rejecting(title: &str) -> Arc<Self> {
        let backend = Self::default();
        backend.reject_titles.lock().unwrap().push(title.to_string());
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<(String, Vec<DocumentNode>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Create { title, content } => Some((title, content)),
                BackendCall::Edit { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl PublishingBackend for MockBackend {
    async fn create_page(
        &self,
        title: &str,
        content: &[DocumentNode],
    ) -> Result<Page, BackendError> {
        self.calls.lock().unwrap().push(BackendCall::Create {
            title: title.to_string(),
            content: content.to_vec(),
        });
        if self.reject_titles.lock().unwrap().iter().any(|t| t == title) {
            return Err(BackendError::Api {
                backend: "mock",
                message: "TITLE_INVALID".into(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = format!("Page-{n}");
        Ok(Page {
            url: format!("https://telegra.ph/{path}"),
            path,
            title: title.to_string(),
        })
    }

    async fn edit_page(
        &self,
        path: &str,
        title: &str,
        _content: &[DocumentNode],
        author: &Author,
    ) -> Result<Page, BackendError> {
        self.calls.lock().unwrap().push(BackendCall::Edit {
            path: path.to_string(),
            title: title.to_string(),
            author: author.clone(),
        });
        if self.fail_edit {
            return Err(BackendError::Api {
                backend: "mock",
                message: "PAGE_ACCESS_DENIED".into(),
            });
        }
        Ok(Page {
            url: format!("https://telegra.ph/{path}"),
            path: path.to_string(),
            title: title.to_string(),
        })
    }
}

/// What a [`MockUploader`] does with each upload.
#[derive(Debug, Clone)]
pub enum UploadBehaviour {
    /// Return `{prefix}/{n}` for the n-th upload.
    Succeed(String),
    /// Accept the request but return no paths.
    Empty,
    /// Fail permanently.
    Fail,
}

/// Upload host that records the content type and bytes of each upload.
pub struct MockUploader {
    pub name: &'static str,
    pub behaviour: UploadBehaviour,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockUploader {
    pub fn new(name: &'static str, behaviour: UploadBehaviour) -> Arc<Self> {
        Arc::new(Self {
            name,
            behaviour,
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn content_types(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(ct, _)| ct.clone())
            .collect()
    }
}

#[async_trait]
impl MediaUploader for MockUploader {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload(&self, path: &Path, content_type: &str) -> Result<Vec<String>, BackendError> {
        let bytes = tokio::fs::read(path).await.unwrap_or_default();
        let n = {
            let mut uploads = self.uploads.lock().unwrap();
            uploads.push((content_type.to_string(), bytes));
            uploads.len()
        };
        match &self.behaviour {
            UploadBehaviour::Succeed(prefix) => Ok(vec![format!("{prefix}/{n}")]),
            UploadBehaviour::Empty => Ok(Vec::new()),
            UploadBehaviour::Fail => Err(BackendError::Api {
                backend: self.name,
                message: "rejected".into(),
            }),
        }
    }
}

/// Capturer returning canned pages, optionally after a delay.
#[derive(Default)]
pub struct MockCapturer {
    pub pages: HashMap<String, CapturedPage>,
    pub delay: Option<Duration>,
}

impl MockCapturer {
    pub fn with_page(mut self, url: &str, page: CapturedPage) -> Self {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        self.pages.insert(key, page);
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Capturer for MockCapturer {
    async fn capture(&self, url: &Url, _opts: &CaptureOptions) -> Result<CapturedPage, ArchiveError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| ArchiveError::CaptureFailed {
                url: url.to_string(),
                reason: "no canned page".into(),
            })
    }
}

/// Encode a solid image in `format`.
pub fn image_bytes(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([200, 100, 50]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut buf), format)
        .unwrap();
    buf
}
