use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;

use review_scraper::cli::{Cli, Commands};
use review_scraper::export::{self, ExportError, JsonlSink, ResultSink, ReviewRecord};
use review_scraper::logging;
use review_scraper::url_utils;
use review_scraper::{BatchCoordinator, ConfigError, CrawlResult, ExtractionPipeline, ReviewCrawler};

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Extraction failed: {0}")]
    Extract(String),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            MainError::Config(_) => 2,
            MainError::Io(_) | MainError::Export(_) | MainError::Extract(_) => 3,
        }
    }
}

fn print_summary(result: &CrawlResult) {
    let name = result.restaurant.name.as_deref().unwrap_or(&result.restaurant.slug);
    println!(
        "{} ({}): {} reviews, {} rated, {} pages fetched of {} discovered, {} errors, stopped: {:?}{}",
        name,
        result.restaurant.location,
        result.reviews.len(),
        result.rated_reviews(),
        result.pages_fetched,
        result.pages_discovered,
        result.errors.len(),
        result.stop_reason,
        if result.success { "" } else { " [FAILED]" },
    );
}

fn write_results(path: &Path, results: &[CrawlResult]) -> Result<(), MainError> {
    let mut sink = JsonlSink::open(path)?;
    for result in results {
        sink.accept(result)?;
    }
    sink.flush()?;
    println!("Saved {} result(s) to {}", sink.written(), path.display());
    Ok(())
}

async fn run(cli: Cli) -> Result<(), MainError> {
    match cli.command {
        Commands::Crawl {
            target,
            slug,
            max_pages,
            output,
            http,
        } => {
            let (location, slug) = match slug {
                Some(slug) => (target, slug),
                None => {
                    let parsed = url_utils::parse_restaurant_url(&url_utils::normalize_url_for_cli(&target))?;
                    (parsed.location, parsed.slug)
                }
            };

            let crawler = ReviewCrawler::with_http(http.to_config())?;
            let result = crawler.crawl_restaurant(&location, &slug, max_pages).await?;
            print_summary(&result);

            match output {
                Some(path) => write_results(&path, std::slice::from_ref(&result))?,
                None => println!("{}", serde_json::to_string_pretty(&result).map_err(ExportError::from)?),
            }
        }

        Commands::Batch {
            file,
            max_pages,
            max_restaurants,
            concurrency,
            output,
            reviews_output,
            http,
        } => {
            let input = std::fs::read_to_string(&file)?;
            let config = http.to_config().with_concurrency(concurrency);
            let crawler = Arc::new(ReviewCrawler::with_http(config)?);
            let batch = BatchCoordinator::new(crawler).with_max_restaurants(max_restaurants);

            let report = batch.crawl_lines(&input, max_pages).await?;
            for result in &report.results {
                print_summary(result);
            }
            println!(
                "Batch: {} succeeded, {} failed, {} reviews from {} pages",
                report.succeeded, report.failed, report.total_reviews, report.total_pages
            );
            write_results(&output, &report.results)?;

            if let Some(path) = reviews_output {
                let file = std::fs::File::create(&path)?;
                let records = report.results.iter().flat_map(ReviewRecord::from_result);
                let count = export::export_to_jsonl(records, std::io::BufWriter::new(file))?;
                println!("Saved {} review(s) to {}", count, path.display());
            }
        }

        Commands::Extract { file, page_index } => {
            let content = std::fs::read_to_string(&file)?;
            let extraction = ExtractionPipeline::new()
                .extract_page(&content, page_index)
                .map_err(|e| MainError::Extract(e.to_string()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&extraction.reviews).map_err(ExportError::from)?
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    let _guard = match &cli.log_dir {
        Some(dir) => match logging::init_logging(dir) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Failed to initialize logging in {}: {}", dir.display(), e);
                return ExitCode::from(3);
            }
        },
        None => {
            if let Err(e) = logging::init_stdout_logging() {
                eprintln!("Failed to initialize logging: {}", e);
            }
            None
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
