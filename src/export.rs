use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::{Channel, CrawlResult, RatingSource};

/// Errors raised while persisting crawl results
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Durable storage for finished crawls. The crawl core never depends on a
/// concrete storage format.
pub trait ResultSink {
    fn accept(&mut self, result: &CrawlResult) -> Result<(), ExportError>;

    fn flush(&mut self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Appends one JSON-encoded [`CrawlResult`] per line.
pub struct JsonlSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| ExportError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl ResultSink for JsonlSink {
    fn accept(&mut self, result: &CrawlResult) -> Result<(), ExportError> {
        serde_json::to_writer(&mut self.writer, result)?;
        self.writer.write_all(b"\n").map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ExportError> {
        self.writer.flush().map_err(|source| ExportError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// One review flattened with its restaurant, for spreadsheet-style analysis.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReviewRecord {
    pub restaurant_slug: String,
    pub restaurant_name: Option<String>,
    pub location: String,
    pub reviewer: Option<String>,
    pub rating: Option<f64>,
    pub strategy: RatingSource,
    pub channel: Channel,
    pub date: Option<String>,
    pub text: Option<String>,
    pub page_index: u32,
}

impl ReviewRecord {
    pub fn from_result(result: &CrawlResult) -> Vec<Self> {
        result
            .reviews
            .iter()
            .map(|review| Self {
                restaurant_slug: result.restaurant.slug.clone(),
                restaurant_name: result.restaurant.name.clone(),
                location: result.restaurant.location.clone(),
                reviewer: review.reviewer.clone(),
                rating: review.rating.map(|r| r.value()),
                strategy: review.strategy,
                channel: review.channel,
                date: review.date.as_ref().map(|d| d.canonical()),
                text: review.text.clone(),
                page_index: review.page_index,
            })
            .collect()
    }
}

/// Export any serializable records to JSONL format
/// Each record is written as a single line of JSON followed by a newline
///
/// # Errors
/// Returns an error if serialization or writing fails
pub fn export_to_jsonl<W: Write, T: Serialize, I: IntoIterator<Item = T>>(
    records: I,
    mut writer: W,
) -> Result<usize, ExportError> {
    let mut count = 0;
    for record in records {
        serde_json::to_writer(&mut writer, &record)?;
        writer.write_all(b"\n").map_err(|source| ExportError::Io {
            path: PathBuf::from("<writer>"),
            source,
        })?;
        count += 1;
    }
    Ok(count)
}
