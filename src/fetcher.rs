//! The page-fetch seam between the crawl core and the transport.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backoff::RetryPolicy;
use crate::governor::RateGovernor;
use crate::network::FetchError;
use crate::url_utils;

/// Raw page returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub content: String,
    pub status_code: u16,
}

/// Retrieves one page. Implementations own retries, timeouts and request
/// pacing; the crawl core treats every error the same way.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url).await
    }
}

/// Routes every request through a shared [`RateGovernor`].
///
/// Retries configured here run outside the governor, so each attempt waits
/// for its own slot. The inner fetcher should not retry on its own.
pub struct GovernedFetcher<F> {
    inner: F,
    governor: Arc<RateGovernor>,
    retry: RetryPolicy,
}

impl<F: PageFetcher> GovernedFetcher<F> {
    pub fn new(inner: F, governor: Arc<RateGovernor>) -> Self {
        Self {
            inner,
            governor,
            retry: RetryPolicy::no_retry(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for GovernedFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.retry
            .run(
                |_| async move {
                    self.governor.acquire().await;
                    self.inner.fetch(url).await
                },
                FetchError::is_retryable,
            )
            .await
    }
}

/// Serves pages from memory, keyed by normalized URL.
///
/// Useful for replaying pages saved by an earlier run and for tests.
/// Unknown URLs answer with a 404 status error.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    pages: HashMap<String, Result<String, u16>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages
            .insert(url_utils::normalize_page_url(url), Ok(html.into()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.pages
            .insert(url_utils::normalize_page_url(url), Err(status));
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let key = url_utils::normalize_page_url(url);
        self.requests.lock().push(key.clone());
        match self.pages.get(&key) {
            Some(Ok(content)) => Ok(FetchedPage {
                content: content.clone(),
                status_code: 200,
            }),
            Some(Err(status)) => Err(FetchError::Status(*status)),
            None => Err(FetchError::Status(404)),
        }
    }
}
