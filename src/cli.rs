use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::{ExponentialBackoff, RetryPolicy};
use crate::config::{Config, CrawlerConfig};

/// Command-line interface for the review crawler.
/// Exit codes: 0=success, 2=invalid arguments or configuration, 3=I/O or export error
#[derive(Parser, Debug)]
#[command(name = "review_scraper")]
#[command(about = "Crawl restaurant review pages into normalized review records")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Also write rotating log files to this directory")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl one restaurant's reviews.
    Crawl {
        #[arg(help = "Listing URL, or the location when --slug is given")]
        target: String,

        #[arg(long, help = "Restaurant slug (TARGET is then the location)")]
        slug: Option<String>,

        #[arg(short, long, help = "Maximum review pages to fetch")]
        max_pages: Option<u32>,

        #[arg(short, long, help = "Append the result as one JSON line to this file")]
        output: Option<PathBuf>,

        #[command(flatten)]
        http: HttpArgs,
    },

    /// Crawl every restaurant listed in a file (`location,slug` or a URL per line).
    Batch {
        #[arg(short, long, help = "Input file with one restaurant per line")]
        file: PathBuf,

        #[arg(short, long, help = "Maximum review pages per restaurant")]
        max_pages: Option<u32>,

        #[arg(long, help = "Only crawl the first N restaurants of the file")]
        max_restaurants: Option<usize>,

        #[arg(
            short,
            long,
            default_value_t = Config::DEFAULT_CONCURRENCY,
            help = "Restaurants crawled in parallel"
        )]
        concurrency: usize,

        #[arg(
            short,
            long,
            default_value = "reviews.jsonl",
            help = "JSONL file receiving one crawl result per line"
        )]
        output: PathBuf,

        #[arg(long, help = "Also write one flattened JSON line per review to this file")]
        reviews_output: Option<PathBuf>,

        #[command(flatten)]
        http: HttpArgs,
    },

    /// Run extraction on a saved review page, without network access.
    Extract {
        #[arg(short, long, help = "Saved HTML page")]
        file: PathBuf,

        #[arg(long, default_value_t = 1, help = "Page index recorded on the reviews")]
        page_index: u32,
    },
}

/// Transport settings shared by the network commands.
#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    #[arg(long, default_value = Config::DEFAULT_BASE_URL, help = "Review site base URL")]
    pub base_url: String,

    #[arg(
        short,
        long,
        default_value = Config::DEFAULT_USER_AGENT,
        help = "User agent string for requests"
    )]
    pub user_agent: String,

    #[arg(
        short,
        long,
        default_value_t = Config::REQUEST_TIMEOUT_SECS,
        help = "Request timeout in seconds"
    )]
    pub timeout: u64,

    #[arg(
        long,
        help = "Minimum milliseconds between any two requests (default from environment or built-in)"
    )]
    pub min_delay_ms: Option<u64>,

    #[arg(long, default_value_t = Config::RETRY_ATTEMPTS, help = "Attempts per page, including the first")]
    pub retries: u32,
}

impl HttpArgs {
    /// Layers the flags over the environment-aware defaults.
    pub fn to_config(&self) -> CrawlerConfig {
        let base_url = crate::url_utils::normalize_url_for_cli(&self.base_url);
        let mut config = CrawlerConfig::from_env_with_defaults().with_base_url(base_url);
        config.user_agent = self.user_agent.clone();
        config.timeout = Duration::from_secs(self.timeout);
        config.retry = RetryPolicy::new(
            self.retries,
            ExponentialBackoff::new(Config::RETRY_BACKOFF_MS, Config::RETRY_BACKOFF_MAX_MS),
        );
        if let Some(ms) = self.min_delay_ms {
            config.min_request_interval = Duration::from_millis(ms);
        }
        config
    }
}

impl Cli {
    /// On error, clap prints help and exits with code 2 (usage error).
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawl_command_with_url() {
        let cli = Cli::try_parse_from([
            "review_scraper",
            "crawl",
            "https://www.zomato.com/pune/foo-kopa-mundhwa/info",
        ])
        .unwrap();
        match cli.command {
            Commands::Crawl {
                target,
                slug,
                max_pages,
                http,
                ..
            } => {
                assert_eq!(target, "https://www.zomato.com/pune/foo-kopa-mundhwa/info");
                assert!(slug.is_none());
                assert!(max_pages.is_none());
                assert_eq!(http.timeout, Config::REQUEST_TIMEOUT_SECS);
                assert_eq!(http.retries, Config::RETRY_ATTEMPTS);
            }
            _ => panic!("Expected Crawl command"),
        }
    }

    #[test]
    fn test_crawl_command_with_slug() {
        let cli = Cli::try_parse_from([
            "review_scraper",
            "crawl",
            "pune",
            "--slug",
            "foo-kopa-mundhwa",
            "--max-pages",
            "3",
            "--min-delay-ms",
            "250",
        ])
        .unwrap();
        match cli.command {
            Commands::Crawl {
                target,
                slug,
                max_pages,
                http,
                ..
            } => {
                assert_eq!(target, "pune");
                assert_eq!(slug.as_deref(), Some("foo-kopa-mundhwa"));
                assert_eq!(max_pages, Some(3));
                let config = http.to_config();
                assert_eq!(config.min_request_interval, Duration::from_millis(250));
            }
            _ => panic!("Expected Crawl command"),
        }
    }

    #[test]
    fn test_batch_command_defaults() {
        let cli = Cli::try_parse_from(["review_scraper", "batch", "--file", "restaurants.txt"]).unwrap();
        match cli.command {
            Commands::Batch {
                file,
                concurrency,
                output,
                max_restaurants,
                reviews_output,
                ..
            } => {
                assert_eq!(file, PathBuf::from("restaurants.txt"));
                assert!(reviews_output.is_none());
                assert_eq!(concurrency, Config::DEFAULT_CONCURRENCY);
                assert_eq!(output, PathBuf::from("reviews.jsonl"));
                assert!(max_restaurants.is_none());
            }
            _ => panic!("Expected Batch command"),
        }
    }

    #[test]
    fn test_extract_command_and_global_log_dir() {
        let cli = Cli::try_parse_from([
            "review_scraper",
            "extract",
            "--file",
            "page.html",
            "--log-dir",
            "logs",
        ])
        .unwrap();
        assert_eq!(cli.log_dir, Some(PathBuf::from("logs")));
        assert!(matches!(cli.command, Commands::Extract { page_index: 1, .. }));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["review_scraper"]).is_err());
    }
}
