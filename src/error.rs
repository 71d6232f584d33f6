//! Error taxonomy for the review crawler.
//!
//! Only [`ConfigError`] ever aborts a crawl before I/O. Everything that goes
//! wrong while walking pages is downgraded to a [`PageFailure`] and recorded
//! on the crawl result instead of being raised.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid input detected before any page is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max pages must be at least 1")]
    ZeroMaxPages,

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("max restaurants must be at least 1")]
    ZeroMaxRestaurants,

    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("cannot derive location and slug from '{0}'")]
    UnrecognizedRestaurantUrl(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

/// Why a single page could not be used.
///
/// The core deliberately does not know why a fetch failed (timeout, block,
/// bad status all look the same); the message is kept for the error log only.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PageFailure {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("parse failed: {0}")]
    Parse(String),
}

/// Classification of a non-fatal per-page error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageErrorKind {
    Fetch,
    Parse,
    PaginationCycle,
}

/// A non-fatal error recorded against one page of a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    pub page_index: u32,
    pub url: String,
    pub kind: PageErrorKind,
    pub message: String,
}

impl PageError {
    pub fn from_failure(page_index: u32, url: &str, failure: &PageFailure) -> Self {
        let (kind, message) = match failure {
            PageFailure::Fetch(msg) => (PageErrorKind::Fetch, msg.clone()),
            PageFailure::Parse(msg) => (PageErrorKind::Parse, msg.clone()),
        };
        Self {
            page_index,
            url: url.to_string(),
            kind,
            message,
        }
    }

    pub fn cycle(page_index: u32, repeated_url: &str) -> Self {
        Self {
            page_index,
            url: repeated_url.to_string(),
            kind: PageErrorKind::PaginationCycle,
            message: format!("next-page link already visited: {}", repeated_url),
        }
    }
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "page {} ({}): {:?} - {}",
            self.page_index, self.url, self.kind, self.message
        )
    }
}
