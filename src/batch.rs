//! Bounded-parallel crawling of many restaurants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::instrument;

use crate::crawler::ReviewCrawler;
use crate::error::{ConfigError, PageError, PageErrorKind};
use crate::models::{CrawlResult, RestaurantTarget};
use crate::url_utils;

/// Outcome of a batch, one result per input restaurant in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<CrawlResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub total_reviews: usize,
    pub total_pages: u32,
}

impl BatchReport {
    fn from_results(results: Vec<CrawlResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            total_reviews: results.iter().map(|r| r.reviews.len()).sum(),
            total_pages: results.iter().map(|r| r.pages_fetched).sum(),
            results,
        }
    }
}

/// Runs restaurant crawls side by side, at most `concurrency` at a time.
///
/// Crawls share nothing but the crawler's fetcher (and so its rate
/// governor). A crawl that fails, or even panics, only affects its own entry.
pub struct BatchCoordinator {
    crawler: Arc<ReviewCrawler>,
    concurrency: usize,
    max_restaurants: Option<usize>,
}

impl BatchCoordinator {
    pub fn new(crawler: Arc<ReviewCrawler>) -> Self {
        let concurrency = crawler.config().concurrency.max(1);
        let max_restaurants = crawler.config().max_restaurants;
        Self {
            crawler,
            concurrency,
            max_restaurants,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_max_restaurants(mut self, max_restaurants: Option<usize>) -> Self {
        self.max_restaurants = max_restaurants;
        self
    }

    /// Validates every entry up front, then crawls. A malformed entry fails
    /// the whole call before any page is fetched.
    pub async fn crawl_many<L, S>(
        &self,
        restaurants: &[(L, S)],
        max_pages: Option<u32>,
    ) -> Result<BatchReport, ConfigError>
    where
        L: AsRef<str>,
        S: AsRef<str>,
    {
        let targets = restaurants
            .iter()
            .map(|(location, slug)| RestaurantTarget::new(location.as_ref(), slug.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.crawl_targets(targets, max_pages).await
    }

    /// Like [`crawl_many`](Self::crawl_many) for batch files: one
    /// `location,slug` pair or listing URL per line.
    pub async fn crawl_lines(&self, input: &str, max_pages: Option<u32>) -> Result<BatchReport, ConfigError> {
        let targets = input
            .lines()
            .filter_map(url_utils::parse_target_line)
            .collect::<Result<Vec<_>, _>>()?;
        self.crawl_targets(targets, max_pages).await
    }

    #[instrument(skip(self, targets), fields(restaurants = targets.len()))]
    pub async fn crawl_targets(
        &self,
        mut targets: Vec<RestaurantTarget>,
        max_pages: Option<u32>,
    ) -> Result<BatchReport, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_restaurants == Some(0) {
            return Err(ConfigError::ZeroMaxRestaurants);
        }
        let max_pages = self.crawler.config().resolve_max_pages(max_pages)?;

        if let Some(limit) = self.max_restaurants {
            if targets.len() > limit {
                tracing::info!(limit, requested = targets.len(), "Truncating batch to max restaurants");
                targets.truncate(limit);
            }
        }

        tracing::info!(
            restaurants = targets.len(),
            concurrency = self.concurrency,
            max_pages,
            "Starting batch crawl"
        );

        let mut slots: Vec<Option<CrawlResult>> = vec![None; targets.len()];
        let mut task_index = HashMap::new();
        let mut in_flight = JoinSet::new();
        let mut pending = targets.iter().cloned().enumerate();

        loop {
            // Fill the pool
            while in_flight.len() < self.concurrency {
                let Some((index, target)) = pending.next() else {
                    break;
                };
                let crawler = Arc::clone(&self.crawler);
                let handle = in_flight.spawn(async move {
                    let result = crawler.crawl_target(&target, max_pages).await;
                    (index, result)
                });
                task_index.insert(handle.id(), index);
            }

            // Collect one finished crawl
            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    if let Some(&index) = task_index.get(&e.id()) {
                        tracing::error!(
                            restaurant = %targets[index],
                            error = %e,
                            "Restaurant crawl task died"
                        );
                        slots[index] = Some(task_failure(&targets[index], &e.to_string()));
                    }
                }
            }
        }

        let results: Vec<CrawlResult> = slots
            .into_iter()
            .zip(&targets)
            .map(|(slot, target)| slot.unwrap_or_else(|| task_failure(target, "crawl did not report")))
            .collect();

        let report = BatchReport::from_results(results);
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            reviews = report.total_reviews,
            pages = report.total_pages,
            "Batch crawl finished"
        );
        Ok(report)
    }
}

fn task_failure(target: &RestaurantTarget, message: &str) -> CrawlResult {
    CrawlResult::failed(
        target,
        PageError {
            page_index: 1,
            url: target.to_string(),
            kind: PageErrorKind::Fetch,
            message: message.to_string(),
        },
    )
}
