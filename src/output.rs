//! Result types returned by the archiver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of archiving one input URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishResult {
    /// The page was published at `url`.
    Published { url: String },
    /// The URL was not archived; `reason` is a short human-readable message.
    Failed { reason: String },
}

impl PublishResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        PublishResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishResult::Published { .. })
    }

    /// The published page URL, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            PublishResult::Published { url } => Some(url),
            PublishResult::Failed { .. } => None,
        }
    }
}

impl fmt::Display for PublishResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishResult::Published { url } => f.write_str(url),
            PublishResult::Failed { reason } => f.write_str(reason),
        }
    }
}

/// Outcome of a batch, keyed by the original input string.
///
/// Holds exactly one entry per input URL, valid or not.
pub type BatchReport = BTreeMap<String, PublishResult>;

/// A page created (and edited) on the publishing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPage {
    /// Public page URL. Carries `?title=` when a fallback slug was used.
    pub url: String,
    /// Backend path of the page, used for later edits.
    pub path: String,
    /// Title the page was published under (truncated to 256 chars).
    pub title: String,
    /// `true` when the backend rejected the title and a random slug was used.
    pub used_fallback_slug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_url_or_reason() {
        let ok = PublishResult::Published {
            url: "https://telegra.ph/Example-01-01".into(),
        };
        assert_eq!(ok.to_string(), "https://telegra.ph/Example-01-01");
        assert_eq!(ok.url(), Some("https://telegra.ph/Example-01-01"));

        let err = PublishResult::failed("Title is required");
        assert_eq!(err.to_string(), "Title is required");
        assert!(!err.is_published());
    }

    #[test]
    fn serialises_with_status_tag() {
        let json = serde_json::to_string(&PublishResult::failed("invalid url")).unwrap();
        assert_eq!(json, r#"{"status":"failed","reason":"invalid url"}"#);
    }
}
