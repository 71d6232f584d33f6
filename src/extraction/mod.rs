//! Review extraction: block discovery, field extraction and rating resolution.
//!
//! A page goes through three steps:
//! 1. [`validate_page`] rejects empty pages and login/app walls
//! 2. review blocks are located with an ordered list of selectors
//! 3. each block runs the [`strategies::RatingStrategy`] chain and the field
//!    extractors in [`fields`]
//!
//! Extraction is a pure function of the page content: the same HTML always
//! yields the same candidates.

pub mod fields;
pub mod strategies;

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

use crate::error::PageFailure;
use crate::models::{Channel, RatingSource, ReviewCandidate};
use crate::parsing_modules::json_ld_parser::{self, ListingData, StructuredReview};
use strategies::{RatingStrategy, ReviewBlock};

lazy_static! {
    /// Tried in order; the first selector with any match defines the blocks.
    static ref BLOCK_SELECTORS: Vec<Selector> = [
        r#"[itemprop="review"]"#,
        r#"[data-testid="review-card"]"#,
        r#"section[class*="ReviewCard"], div[class*="ReviewCard"]"#,
        r#"article[class*="review"], section[class*="review"]"#,
        r#"div[class*="review-card"], div[class*="UserReview"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Invalid review block selector"))
    .collect();

    static ref BODY: Selector = Selector::parse("body").expect("Invalid body selector");
}

/// Phrases shown by login and app-install interstitials.
const WALL_PHRASES: &[&str] = &[
    "continue in app",
    "log in to continue",
    "login to continue",
    "sign up now",
    "download our app",
    "get the zomato app",
    "create your account",
    "join zomato",
];
const WALL_THRESHOLD: usize = 2;

/// Everything extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub listing: Option<ListingData>,
    pub reviews: Vec<ReviewCandidate>,
}

#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    chain: Vec<RatingStrategy>,
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self {
            chain: RatingStrategy::CHAIN.to_vec(),
        }
    }
}

impl ExtractionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and extracts one page.
    pub fn extract_page(&self, content: &str, page_index: u32) -> Result<PageExtraction, PageFailure> {
        if content.trim().is_empty() {
            return Err(PageFailure::Parse("empty page".to_string()));
        }
        let document = Html::parse_document(content);
        validate_page(&document)?;
        Ok(self.extract_document(&document, page_index))
    }

    /// Extracts candidates from an already validated document.
    pub fn extract_document(&self, document: &Html, page_index: u32) -> PageExtraction {
        let listing = json_ld_parser::extract_listing(document);
        let structured: &[StructuredReview] = listing
            .as_ref()
            .map(|l| l.reviews.as_slice())
            .unwrap_or_default();

        let blocks = find_review_blocks(document);
        let mut reviews = Vec::with_capacity(blocks.len());

        if blocks.is_empty() {
            reviews.extend(
                structured
                    .iter()
                    .filter_map(|review| candidate_from_structured(review, page_index)),
            );
            if !reviews.is_empty() {
                tracing::debug!(page_index, count = reviews.len(), "No review blocks, using JSON-LD reviews");
            }
        } else {
            for element in blocks {
                match self.extract_block(element, structured, page_index) {
                    Some(candidate) => reviews.push(candidate),
                    None => tracing::debug!(page_index, "Skipping empty review block"),
                }
            }
        }

        PageExtraction { listing, reviews }
    }

    /// Builds one candidate, or `None` for a block with no reviewer, text
    /// or rating (layout noise).
    fn extract_block(
        &self,
        element: ElementRef,
        structured: &[StructuredReview],
        page_index: u32,
    ) -> Option<ReviewCandidate> {
        let reviewer = fields::extract_reviewer(element);
        let text = fields::extract_text(element, reviewer.as_deref());

        let block = ReviewBlock {
            element,
            reviewer: reviewer.clone(),
            structured,
        };
        let (rating, strategy) = strategies::resolve(&self.chain, &block);

        if reviewer.is_none() && text.is_none() && rating.is_none() {
            return None;
        }

        Some(ReviewCandidate {
            reviewer,
            rating,
            text,
            date: fields::extract_date(element),
            channel: fields::classify_channel(element),
            page_index,
            strategy,
        })
    }
}

fn candidate_from_structured(review: &StructuredReview, page_index: u32) -> Option<ReviewCandidate> {
    if review.author.is_none() && review.body.is_none() && review.rating.is_none() {
        return None;
    }
    Some(ReviewCandidate {
        reviewer: review.author.clone(),
        rating: review.rating,
        text: review.body.as_deref().map(fields::collapse),
        date: review
            .date_published
            .as_deref()
            .and_then(fields::parse_review_date),
        channel: Channel::Unknown,
        page_index,
        strategy: if review.rating.is_some() {
            RatingSource::Structured
        } else {
            RatingSource::None
        },
    })
}

/// Locates review blocks.
///
/// A match is a wrapper, not a review, when it holds several matches or
/// one match that is a review card of its own (it has a reviewer or text).
/// Of the remaining nested matches only the outermost is kept.
pub fn find_review_blocks(document: &Html) -> Vec<ElementRef<'_>> {
    for selector in BLOCK_SELECTORS.iter() {
        let matches: Vec<ElementRef> = document.select(selector).collect();
        if matches.is_empty() {
            continue;
        }

        let ids: HashSet<_> = matches.iter().map(|el| el.id()).collect();
        let is_wrapper = |el: &ElementRef| {
            let inner: Vec<ElementRef> = el
                .descendants()
                .skip(1)
                .filter(|node| ids.contains(&node.id()))
                .filter_map(ElementRef::wrap)
                .collect();
            inner.len() >= 2 || inner.iter().any(|card| is_review_card(*card))
        };
        let blocks: Vec<ElementRef> = matches
            .iter()
            .copied()
            .filter(|el| !is_wrapper(el))
            .collect();

        let kept: HashSet<_> = blocks.iter().map(|el| el.id()).collect();
        return blocks
            .into_iter()
            .filter(|el| !el.ancestors().any(|a| kept.contains(&a.id())))
            .collect();
    }
    Vec::new()
}

fn is_review_card(element: ElementRef) -> bool {
    let reviewer = fields::extract_reviewer(element);
    reviewer.is_some() || fields::extract_text(element, reviewer.as_deref()).is_some()
}

/// Rejects pages that cannot hold reviews: login/app walls without any
/// review block.
pub fn validate_page(document: &Html) -> Result<(), PageFailure> {
    if !find_review_blocks(document).is_empty() {
        return Ok(());
    }

    let text = document
        .select(&BODY)
        .next()
        .map(|body| body.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
        .to_lowercase();
    let text = fields::collapse(&text);

    let hits = WALL_PHRASES.iter().filter(|phrase| text.contains(*phrase)).count();
    if hits >= WALL_THRESHOLD {
        return Err(PageFailure::Parse(format!(
            "login or app wall detected ({} markers)",
            hits
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;

    fn page(body: &str) -> String {
        format!("<html><head><title>Reviews</title></head><body>{}</body></html>", body)
    }

    #[test]
    fn test_blocks_are_outermost_and_skip_containers() {
        let html = page(
            r#"<div class="reviews-list">
                <section class="review-item"><p class="review-text">First review here</p></section>
                <section class="review-item"><p>Second review text</p></section>
            </div>"#,
        );
        let document = Html::parse_document(&html);
        assert_eq!(find_review_blocks(&document).len(), 2);

        let nested = page(
            r#"<section class="reviews-section">
                <article class="review"><section class="review-meta">meta</section><p>Body one here</p></article>
                <article class="review"><p>Body two here</p></article>
            </section>"#,
        );
        let document = Html::parse_document(&nested);
        assert_eq!(find_review_blocks(&document).len(), 2);
    }

    #[test]
    fn test_wrapper_around_single_review_is_not_a_block() {
        let wrapper = |cards: &str| {
            page(&format!(
                r#"<section class="reviews-section">
                    <h2>Reviews</h2>
                    <div class="rating-summary">4.2</div>
                    {}
                </section>"#,
                cards
            ))
        };
        let card = |name: &str| {
            format!(
                r#"<article class="review"><a href="/users/{0}">{0}</a><p>Came for dinner with family.</p></article>"#,
                name
            )
        };

        let one = ExtractionPipeline::new().extract_page(&wrapper(&card("asha")), 1).unwrap();
        assert_eq!(one.reviews.len(), 1);
        assert_eq!(one.reviews[0].reviewer.as_deref(), Some("asha"));
        assert_eq!(one.reviews[0].rating, None);
        assert_eq!(one.reviews[0].strategy, RatingSource::None);

        let two = ExtractionPipeline::new()
            .extract_page(&wrapper(&(card("asha") + &card("ravi"))), 1)
            .unwrap();
        assert_eq!(two.reviews.len(), 2);
        assert_eq!(two.reviews[0], one.reviews[0]);
    }

    #[test]
    fn test_unresolved_rating_is_kept() {
        let html = page(
            r#"<section class="review"><a href="/users/1">Asha</a><p>Lovely ambience, slow service.</p></section>"#,
        );
        let extraction = ExtractionPipeline::new().extract_page(&html, 1).unwrap();
        assert_eq!(extraction.reviews.len(), 1);
        let review = &extraction.reviews[0];
        assert_eq!(review.rating, None);
        assert_eq!(review.strategy, RatingSource::None);
        assert_eq!(review.reviewer.as_deref(), Some("Asha"));
        assert_eq!(review.text.as_deref(), Some("Lovely ambience, slow service."));
    }

    #[test]
    fn test_empty_shell_blocks_skipped() {
        let html = page(
            r#"<section class="review"></section>
               <section class="review"><a href="/users/2">Ravi</a></section>"#,
        );
        let extraction = ExtractionPipeline::new().extract_page(&html, 2).unwrap();
        assert_eq!(extraction.reviews.len(), 1);
        assert_eq!(extraction.reviews[0].page_index, 2);
    }

    #[test]
    fn test_json_ld_reviews_when_no_blocks() {
        let html = page(
            r#"<script type="application/ld+json">
                {"@type": "Restaurant", "name": "Foo Kopa",
                 "review": [{"author": "Asha", "reviewRating": {"ratingValue": 4},
                             "reviewBody": "Great  food", "datePublished": "2023-02-01"}]}
            </script>"#,
        );
        let extraction = ExtractionPipeline::new().extract_page(&html, 1).unwrap();
        assert_eq!(extraction.listing.as_ref().and_then(|l| l.name.as_deref()), Some("Foo Kopa"));
        assert_eq!(extraction.reviews.len(), 1);
        let review = &extraction.reviews[0];
        assert_eq!(review.strategy, RatingSource::Structured);
        assert_eq!(review.rating, Rating::new(4.0));
        assert_eq!(review.text.as_deref(), Some("Great food"));
        assert_eq!(review.channel, Channel::Unknown);
    }

    #[test]
    fn test_wall_and_empty_pages_fail() {
        let wall = page("<div>Log in to continue</div><div>Download our app for the best experience</div>");
        assert!(matches!(
            ExtractionPipeline::new().extract_page(&wall, 1),
            Err(PageFailure::Parse(_))
        ));
        assert!(matches!(
            ExtractionPipeline::new().extract_page("   ", 1),
            Err(PageFailure::Parse(_))
        ));
    }

    #[test]
    fn test_page_without_reviews_is_ok() {
        let html = page("<p>No reviews yet. Sign up now to write the first one.</p>");
        let extraction = ExtractionPipeline::new().extract_page(&html, 1).unwrap();
        assert!(extraction.reviews.is_empty());
    }
}
