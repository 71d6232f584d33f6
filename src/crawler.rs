//! Per-restaurant pipeline: walk pages, extract reviews, deduplicate.

use scraper::Html;
use std::sync::Arc;
use tracing::instrument;

use crate::backoff::RetryPolicy;
use crate::config::CrawlerConfig;
use crate::dedup::Deduplicator;
use crate::error::{ConfigError, PageError, PageFailure};
use crate::extraction::{self, ExtractionPipeline};
use crate::fetcher::{GovernedFetcher, PageFetcher};
use crate::governor::RateGovernor;
use crate::metadata;
use crate::models::{CrawlResult, RestaurantInfo, RestaurantTarget, ReviewCandidate};
use crate::network::HttpClient;
use crate::pagination::PaginationWalker;
use crate::url_utils;

/// Crawls review listings through a shared [`PageFetcher`].
///
/// Cheap to share behind an `Arc`; every crawl builds its own walker.
pub struct ReviewCrawler {
    fetcher: Arc<dyn PageFetcher>,
    pipeline: ExtractionPipeline,
    deduplicator: Deduplicator,
    config: CrawlerConfig,
}

impl ReviewCrawler {
    /// Uses `fetcher` as-is; pacing and retries are its business.
    pub fn new(fetcher: Arc<dyn PageFetcher>, config: CrawlerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            fetcher,
            pipeline: ExtractionPipeline::new(),
            deduplicator: Deduplicator::new(),
            config,
        })
    }

    /// Real HTTP client behind a rate governor built from `config`.
    pub fn with_http(config: CrawlerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        // Retries sit above the governor so every attempt is paced.
        let client = HttpClient::new(config.user_agent.clone(), config.timeout, RetryPolicy::no_retry())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let governor = Arc::new(RateGovernor::new(config.min_request_interval));
        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(GovernedFetcher::new(client, governor).with_retry(config.retry));
        Self::new(fetcher, config)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Validates the inputs, then crawls. Only configuration problems are
    /// returned as errors; everything else lands in the result.
    pub async fn crawl_restaurant(
        &self,
        location: &str,
        slug: &str,
        max_pages: Option<u32>,
    ) -> Result<CrawlResult, ConfigError> {
        let target = RestaurantTarget::new(location, slug)?;
        let max_pages = self.config.resolve_max_pages(max_pages)?;
        Ok(self.crawl_target(&target, max_pages).await)
    }

    /// Crawls an already validated target.
    #[instrument(skip(self, target), fields(restaurant = %target))]
    pub async fn crawl_target(&self, target: &RestaurantTarget, max_pages: u32) -> CrawlResult {
        let start_url = url_utils::review_url(&self.config.base_url, target);
        tracing::info!(url = %start_url, max_pages, "Starting restaurant crawl");

        let mut walker = PaginationWalker::new(Arc::clone(&self.fetcher), &start_url, max_pages);
        let mut restaurant: Option<RestaurantInfo> = None;
        let mut candidates: Vec<ReviewCandidate> = Vec::new();
        let mut extraction_errors: Vec<PageError> = Vec::new();
        let mut first_page_ok = false;

        while let Some(page) = walker.next_page().await {
            let Ok(content) = &page.content else {
                continue;
            };
            let wants_info = page.page_index == 1;
            match self.process_page(content, page.page_index, wants_info.then_some(target)) {
                Ok((reviews, info)) => {
                    if wants_info {
                        first_page_ok = true;
                        restaurant = info;
                    }
                    tracing::debug!(page_index = page.page_index, reviews = reviews.len(), "Page extracted");
                    candidates.extend(reviews);
                }
                Err(failure) => {
                    extraction_errors.push(PageError::from_failure(page.page_index, &page.url, &failure));
                }
            }
        }

        let summary = walker.finish();
        let mut errors = summary.errors;
        errors.extend(extraction_errors);
        errors.sort_by_key(|e| e.page_index);

        let reviews = self.deduplicator.dedupe(candidates);
        let result = CrawlResult {
            restaurant: restaurant.unwrap_or_else(|| RestaurantInfo::unresolved(target)),
            reviews,
            pages_fetched: summary.pages_fetched,
            pages_discovered: summary.pages_discovered,
            errors,
            success: first_page_ok,
            stop_reason: summary.stop_reason,
        };

        if result.success {
            tracing::info!(
                reviews = result.reviews.len(),
                rated = result.rated_reviews(),
                pages = result.pages_fetched,
                errors = result.errors.len(),
                stop_reason = ?result.stop_reason,
                "Restaurant crawl finished"
            );
        } else {
            tracing::warn!(errors = result.errors.len(), "Restaurant crawl failed: first page unusable");
        }
        result
    }

    /// Synchronous so the parsed document never lives across an await.
    fn process_page(
        &self,
        content: &str,
        page_index: u32,
        target: Option<&RestaurantTarget>,
    ) -> Result<(Vec<ReviewCandidate>, Option<RestaurantInfo>), PageFailure> {
        let document = Html::parse_document(content);
        extraction::validate_page(&document)?;
        let extraction = self.pipeline.extract_document(&document, page_index);
        let info = target
            .map(|t| metadata::extract_restaurant_info(&document, extraction.listing.as_ref(), t));
        Ok((extraction.reviews, info))
    }
}
