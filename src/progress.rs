//! Progress-callback trait for per-URL archiving events.
//!
//! Inject an [`Arc<dyn ArchiveProgressCallback>`] via
//! [`crate::config::ArchiveConfigBuilder::progress_callback`] to receive events
//! while a batch runs.
//!
//! Publish jobs run concurrently, so `on_job_start` and `on_job_complete` may
//! be called from several tasks at once and in any order.
//!
//! # Example
//!
//! ```rust
//! use telegraph_wayback::{ArchiveConfig, ArchiveProgressCallback, PublishResult};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ArchiveProgressCallback for Counter {
//!     fn on_job_complete(&self, url: &str, result: &PublishResult) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{url} => {result}");
//!     }
//! }
//!
//! let config = ArchiveConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PublishResult;
use std::sync::Arc;

/// Called by [`crate::Archiver`] as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ArchiveProgressCallback: Send + Sync {
    /// Called once validation is done, before capture starts.
    ///
    /// `valid` counts URLs that will be captured, `invalid` those rejected.
    fn on_batch_start(&self, valid: usize, invalid: usize) {
        let _ = (valid, invalid);
    }

    /// Called when the publish job for `url` starts.
    fn on_job_start(&self, url: &str) {
        let _ = url;
    }

    /// Called when the publish job for `url` has an outcome.
    fn on_job_complete(&self, url: &str, result: &PublishResult) {
        let _ = (url, result);
    }

    /// Called once after every job has finished.
    fn on_batch_complete(&self, published: usize, failed: usize) {
        let _ = (published, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ArchiveProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ArchiveConfig`].
pub type ProgressCallback = Arc<dyn ArchiveProgressCallback>;
