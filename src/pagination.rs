//! Page-by-page traversal of one restaurant's review listing.

use scraper::Html;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{PageError, PageFailure};
use crate::extraction;
use crate::fetcher::PageFetcher;
use crate::models::{PageFetchResult, StopReason};
use crate::parsing_modules::pagination_parser::{self, PaginationInfo};
use crate::url_utils;

#[derive(Debug, Clone, PartialEq, Eq)]
enum WalkerState {
    /// A URL is queued; `next_page` will fetch it.
    Pending(String),
    Done,
}

/// Counters and errors left once a walk has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    /// Pages that were fetched and parsed.
    pub pages_fetched: u32,
    /// Distinct page URLs seen: visited pages, next links and numbered links.
    pub pages_discovered: u32,
    pub errors: Vec<PageError>,
    pub stop_reason: StopReason,
}

/// Walks a paginated listing strictly in order, one fetch per call to
/// [`PaginationWalker::next_page`].
///
/// The walker owns its visited-link set; it is discarded with the walker.
/// Termination is guaranteed: every page consumes one unit of `max_pages`,
/// and a next link pointing at a visited page stops the walk.
pub struct PaginationWalker {
    fetcher: Arc<dyn PageFetcher>,
    max_pages: u32,
    state: WalkerState,
    visited: HashSet<String>,
    discovered: HashSet<String>,
    known_pages: BTreeMap<u32, String>,
    attempted: u32,
    fetched: u32,
    errors: Vec<PageError>,
    stop_reason: Option<StopReason>,
}

impl PaginationWalker {
    /// `max_pages` must already be validated (at least 1).
    pub fn new(fetcher: Arc<dyn PageFetcher>, start_url: &str, max_pages: u32) -> Self {
        let mut discovered = HashSet::new();
        discovered.insert(url_utils::normalize_page_url(start_url));
        Self {
            fetcher,
            max_pages,
            state: WalkerState::Pending(start_url.to_string()),
            visited: HashSet::new(),
            discovered,
            known_pages: BTreeMap::new(),
            attempted: 0,
            fetched: 0,
            errors: Vec::new(),
            stop_reason: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == WalkerState::Done
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Fetches the next page, or returns `None` once the walk is over.
    pub async fn next_page(&mut self) -> Option<PageFetchResult> {
        let url = match std::mem::replace(&mut self.state, WalkerState::Done) {
            WalkerState::Pending(url) => url,
            WalkerState::Done => return None,
        };

        self.visited.insert(url_utils::normalize_page_url(&url));
        self.attempted += 1;
        let page_index = self.attempted;

        tracing::debug!(page_index, url = %url, "Fetching review page");

        let (content, next_link) = match self.fetcher.fetch(&url).await {
            Ok(page) => match inspect_page(&page.content, &url) {
                Ok(info) => {
                    self.fetched += 1;
                    self.remember(&info);
                    (Ok(page.content), info.next)
                }
                Err(failure) => (Err(failure), None),
            },
            Err(e) => (Err(PageFailure::Fetch(e.to_string())), None),
        };

        if let Err(failure) = &content {
            tracing::warn!(page_index, url = %url, error = %failure, "Page failed");
            self.errors
                .push(PageError::from_failure(page_index, &url, failure));
        }

        self.schedule(page_index, &url, next_link.as_deref(), content.is_ok());

        Some(PageFetchResult {
            page_index,
            url,
            content,
            next_link,
        })
    }

    pub fn finish(self) -> WalkSummary {
        WalkSummary {
            pages_fetched: self.fetched,
            pages_discovered: self.discovered.len() as u32,
            errors: self.errors,
            stop_reason: self.stop_reason.unwrap_or(StopReason::NoNextPage),
        }
    }

    fn remember(&mut self, info: &PaginationInfo) {
        for (number, link) in &info.numbered {
            self.known_pages.entry(*number).or_insert_with(|| link.clone());
            self.discovered.insert(url_utils::normalize_page_url(link));
        }
        if let Some(next) = &info.next {
            self.discovered.insert(url_utils::normalize_page_url(next));
        }
    }

    /// Decides the transition after a page: queue the next URL or stop.
    fn schedule(&mut self, page_index: u32, url: &str, next_link: Option<&str>, page_ok: bool) {
        let candidate = if page_ok {
            next_link.map(str::to_string)
        } else {
            self.recovery_link(page_index, url)
        };

        let reason = match candidate {
            None if page_ok => StopReason::NoNextPage,
            None => StopReason::Unrecoverable,
            Some(next) if self.visited.contains(&url_utils::normalize_page_url(&next)) => {
                tracing::warn!(page_index, next = %next, "Pagination cycle detected");
                self.errors.push(PageError::cycle(page_index, &next));
                StopReason::Cycle
            }
            Some(_) if self.attempted >= self.max_pages => StopReason::MaxPages,
            Some(next) => {
                self.state = WalkerState::Pending(next);
                return;
            }
        };

        tracing::debug!(pages = self.attempted, reason = ?reason, "Pagination finished");
        self.stop_reason = Some(reason);
    }

    /// After a failed page the only way forward is a numbered link learned
    /// from an earlier page.
    fn recovery_link(&self, page_index: u32, url: &str) -> Option<String> {
        let page_no = url_utils::page_number(url).unwrap_or(page_index);
        self.known_pages
            .get(&(page_no + 1))
            .filter(|link| !self.visited.contains(&url_utils::normalize_page_url(link)))
            .cloned()
    }
}

/// Parses just enough of a page to validate it and find the way forward.
fn inspect_page(content: &str, url: &str) -> Result<PaginationInfo, PageFailure> {
    if content.trim().is_empty() {
        return Err(PageFailure::Parse("empty page".to_string()));
    }
    let document = Html::parse_document(content);
    extraction::validate_page(&document)?;
    Ok(pagination_parser::discover_pagination(&document, url))
}
