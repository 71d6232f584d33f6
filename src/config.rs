// Global configuration constants and the validated runtime configuration.

use std::time::Duration;
use url::Url;

use crate::backoff::{ExponentialBackoff, RetryPolicy};
use crate::error::ConfigError;

pub struct Config;

impl Config {
    // Target site
    pub const DEFAULT_BASE_URL: &'static str = "https://www.zomato.com";
    pub const DEFAULT_USER_AGENT: &'static str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    // Pagination
    pub const MAX_PAGES_CEILING: u32 = 200;

    // Batch
    pub const DEFAULT_CONCURRENCY: usize = 4;

    // HTTP/Network config
    pub const REQUEST_TIMEOUT_SECS: u64 = 15;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const MIN_REQUEST_INTERVAL_MS: u64 = 1500;
    pub const RETRY_ATTEMPTS: u32 = 3;
    pub const RETRY_BACKOFF_MS: u64 = 500;
    pub const RETRY_BACKOFF_MAX_MS: u64 = 8_000;
}

/// Runtime settings shared by the single-restaurant and batch entry points.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub base_url: String,
    /// Default page limit when a call does not pass its own.
    pub max_pages: Option<u32>,
    pub max_restaurants: Option<usize>,
    pub concurrency: usize,
    /// Minimum spacing between any two requests across the whole batch.
    pub min_request_interval: Duration,
    pub user_agent: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: Config::DEFAULT_BASE_URL.to_string(),
            max_pages: None,
            max_restaurants: None,
            concurrency: Config::DEFAULT_CONCURRENCY,
            min_request_interval: Duration::from_millis(Config::MIN_REQUEST_INTERVAL_MS),
            user_agent: Config::DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(Config::REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::new(
                Config::RETRY_ATTEMPTS,
                ExponentialBackoff::new(Config::RETRY_BACKOFF_MS, Config::RETRY_BACKOFF_MAX_MS),
            ),
        }
    }
}

impl CrawlerConfig {
    /// Defaults with `REVIEW_SCRAPER_MIN_DELAY_MS` and `REVIEW_SCRAPER_CONCURRENCY`
    /// applied when set to parseable values.
    pub fn from_env_with_defaults() -> Self {
        let mut config = Self::default();

        if let Some(ms) = std::env::var("REVIEW_SCRAPER_MIN_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.min_request_interval = Duration::from_millis(ms);
        }

        if let Some(n) = std::env::var("REVIEW_SCRAPER_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.concurrency = n;
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_min_request_interval(mut self, interval: Duration) -> Self {
        self.min_request_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.max_restaurants == Some(0) {
            return Err(ConfigError::ZeroMaxRestaurants);
        }
        if self.max_pages == Some(0) {
            return Err(ConfigError::ZeroMaxPages);
        }
        let parsed = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "scheme must be http or https".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves a per-call page limit against the configured default and the
    /// hard ceiling. Zero is rejected; anything above the ceiling is clamped.
    pub fn resolve_max_pages(&self, requested: Option<u32>) -> Result<u32, ConfigError> {
        match requested.or(self.max_pages) {
            Some(0) => Err(ConfigError::ZeroMaxPages),
            Some(n) if n > Config::MAX_PAGES_CEILING => {
                tracing::warn!(
                    requested = n,
                    ceiling = Config::MAX_PAGES_CEILING,
                    "Page limit above safety ceiling, clamping"
                );
                Ok(Config::MAX_PAGES_CEILING)
            }
            Some(n) => Ok(n),
            None => Ok(Config::MAX_PAGES_CEILING),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CrawlerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.min_request_interval, Duration::from_millis(1500));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = CrawlerConfig::default().with_concurrency(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));

        let config = CrawlerConfig::default().with_max_pages(Some(0));
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxPages));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let config = CrawlerConfig::default().with_base_url("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));

        let config = CrawlerConfig::default().with_base_url("ftp://test.local");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_max_pages() {
        let config = CrawlerConfig::default();
        assert_eq!(config.resolve_max_pages(Some(3)), Ok(3));
        assert_eq!(config.resolve_max_pages(None), Ok(Config::MAX_PAGES_CEILING));
        assert_eq!(config.resolve_max_pages(Some(0)), Err(ConfigError::ZeroMaxPages));
        assert_eq!(
            config.resolve_max_pages(Some(10_000)),
            Ok(Config::MAX_PAGES_CEILING)
        );

        let config = CrawlerConfig::default().with_max_pages(Some(5));
        assert_eq!(config.resolve_max_pages(None), Ok(5));
        assert_eq!(config.resolve_max_pages(Some(2)), Ok(2));
    }
}
