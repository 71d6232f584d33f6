//! Next-page discovery for paginated review listings.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

use crate::url_utils;

lazy_static! {
    static ref REL_NEXT: Selector =
        Selector::parse(r#"link[rel~="next"][href], a[rel~="next"][href]"#).expect("Invalid rel=next selector");
    static ref ANCHORS: Selector = Selector::parse("a[href]").expect("Invalid anchor selector");
    static ref CHEVRON: Selector =
        Selector::parse(r#"[class*="chevron-right"], [class*="ChevronRight"], [data-icon*="chevron-right"]"#)
            .expect("Invalid chevron selector");
}

const NEXT_LABELS: &[&str] = &["next", "next page", "›", "»", ">", "next ›", "next »"];

/// Pagination links found on one page, all absolute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationInfo {
    /// Best guess for the page after the current one.
    pub next: Option<String>,
    /// Numbered page links (`?page=N`) keyed by page number.
    pub numbered: BTreeMap<u32, String>,
}

/// Inspects the document for the link to the following page.
///
/// Tries, in order: `rel="next"`, an anchor labelled "next" (text,
/// `aria-label` or a chevron icon), then the numbered link for the current
/// page number + 1. A link back to the current page is returned as found;
/// the walker treats it as a cycle.
pub fn discover_pagination(document: &Html, current_url: &str) -> PaginationInfo {
    let numbered = numbered_links(document, current_url);

    let next = rel_next(document, current_url)
        .or_else(|| labelled_next(document, current_url))
        .or_else(|| {
            let current = url_utils::page_number(current_url).unwrap_or(1);
            numbered.get(&(current + 1)).cloned()
        });

    PaginationInfo { next, numbered }
}

fn resolve(href: &str, current_url: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    url_utils::convert_to_absolute_url(href, current_url).ok()
}

fn rel_next(document: &Html, current_url: &str) -> Option<String> {
    document
        .select(&REL_NEXT)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|href| resolve(href, current_url))
}

fn labelled_next(document: &Html, current_url: &str) -> Option<String> {
    document
        .select(&ANCHORS)
        .filter(|anchor| is_next_anchor(anchor))
        .filter_map(|anchor| anchor.value().attr("href"))
        .find_map(|href| resolve(href, current_url))
}

fn is_next_anchor(anchor: &ElementRef) -> bool {
    if anchor.value().attr("aria-disabled") == Some("true") {
        return false;
    }

    let text = anchor.text().collect::<String>();
    let text = text.trim().to_lowercase();
    if NEXT_LABELS.contains(&text.as_str()) {
        return true;
    }

    let aria = anchor
        .value()
        .attr("aria-label")
        .or_else(|| anchor.value().attr("title"))
        .map(|label| label.to_lowercase());
    if aria.is_some_and(|label| label.contains("next")) {
        return true;
    }

    text.is_empty() && anchor.select(&CHEVRON).next().is_some()
}

fn numbered_links(document: &Html, current_url: &str) -> BTreeMap<u32, String> {
    let mut pages = BTreeMap::new();
    for href in document.select(&ANCHORS).filter_map(|a| a.value().attr("href")) {
        let Some(absolute) = resolve(href, current_url) else {
            continue;
        };
        if let Some(number) = url_utils::page_number(&absolute) {
            pages.entry(number).or_insert(absolute);
        }
    }
    pages
}
