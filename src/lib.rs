pub mod backoff;
pub mod batch;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod error;
pub mod export;
pub mod extraction;
pub mod fetcher;
pub mod governor;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod network;
pub mod pagination;
pub mod parsing_modules;
pub mod url_utils;

// Re-export main types for library usage
pub use batch::{BatchCoordinator, BatchReport};
pub use config::{Config, CrawlerConfig};
pub use crawler::ReviewCrawler;
pub use dedup::{DedupKey, Deduplicator};
pub use error::{ConfigError, PageError, PageErrorKind, PageFailure};
pub use export::{ExportError, JsonlSink, ResultSink};
pub use extraction::{ExtractionPipeline, PageExtraction};
pub use fetcher::{FetchedPage, GovernedFetcher, MemoryFetcher, PageFetcher};
pub use governor::RateGovernor;
pub use models::{
    Channel, CrawlResult, PageFetchResult, Rating, RatingSource, RestaurantInfo, RestaurantTarget,
    ReviewCandidate, ReviewDate, StopReason,
};
pub use network::{FetchError, HttpClient};
pub use pagination::PaginationWalker;
