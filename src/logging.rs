/// Logging setup: stdout plus daily-rotated text and JSON files.
///
/// - `review_scraper.log` - human-readable text, no ANSI colors
/// - `review_scraper.json.log` - one JSON object per event, with span context
///
/// Both file writers are non-blocking; the returned [`LoggingGuard`] must be
/// kept alive until exit or buffered lines are lost.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const TEXT_LOG: &str = "review_scraper.log";
const JSON_LOG: &str = "review_scraper.json.log";

/// Flushes the file writers when dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _text: WorkerGuard,
    _json: WorkerGuard,
}

/// `RUST_LOG` if set and valid, else `info`.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the tracing subscriber with stdout and file layers.
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging<P: AsRef<Path>>(
    log_dir: P,
) -> Result<LoggingGuard, Box<dyn std::error::Error + Send + Sync>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let text_file_appender = tracing_appender::rolling::daily(log_path, TEXT_LOG);
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender = tracing_appender::rolling::daily(log_path, JSON_LOG);
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(env_filter());

    // Terminal output goes to stderr so stdout stays clean for results
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()?;

    tracing::debug!(dir = %log_path.display(), "Logging initialized");

    Ok(LoggingGuard {
        _text: text_guard,
        _json: json_guard,
    })
}

/// Terminal-only logging, for runs without a log directory.
pub fn init_stdout_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(env_filter()),
        )
        .try_init()?;
    Ok(())
}
