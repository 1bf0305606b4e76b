//! # telegraph-wayback
//!
//! Archive web pages to [Telegraph](https://telegra.ph): a screenshot, the
//! article text, and every embedded image rehosted so the archive outlives the
//! original site.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Validate  absolute http(s) URLs only; the rest go straight to the report
//!  ├─ 2. Capture   render service or plain HTTP, under one shared deadline
//!  ├─ 3. Extract   decode charset, pick article body and title
//!  ├─ 4. Convert   HTML → ordered node tree, media rehosted concurrently
//!  ├─ 5. Publish   createPage (slug fallback) + editPage with author metadata
//!  └─ 6. Report    one entry per input URL: page URL or failure reason
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use telegraph_wayback::{ArchiveConfig, Archiver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let archiver = Archiver::new(ArchiveConfig::default())?;
//!     let urls = vec!["https://example.org".to_string()];
//!     for (orig, result) in archiver.archive_batch(&urls).await? {
//!         println!("{orig} => {result}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! A broken image never costs the article: it keeps its original link. A
//! failed page never costs the batch: it becomes a failure entry. Only an
//! empty batch, a missed capture deadline, account creation, or cancellation
//! fail the whole call.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `telegraph-wayback` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! telegraph-wayback = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod node;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{archive_batch, validate_url, Archiver, MISSING_TITLE};
pub use backend::{Author, ImgbbClient, MediaUploader, Page, PublishingBackend, TelegraphClient};
pub use capture::{CaptureData, CapturedPage, Capturer, HttpCapturer};
pub use config::{ArchiveConfig, ArchiveConfigBuilder, CaptureOptions};
pub use error::{ArchiveError, BackendError, MediaError};
pub use node::{Attributes, DocumentNode, NodeElement};
pub use output::{BatchReport, PublishResult, PublishedPage};
pub use pipeline::convert::{AttributeResolver, DocumentConverter};
pub use pipeline::extract::{ExtractedContent, Extractor, ReadabilityLikeExtractor};
pub use pipeline::rehost::MediaRehoster;
pub use progress::{ArchiveProgressCallback, NoopProgressCallback, ProgressCallback};
pub use publish::{PagePublisher, Subject};
pub use retry::{RetryPolicy, Retryable};
