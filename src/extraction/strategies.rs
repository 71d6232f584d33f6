//! Rating strategies, tried in a fixed order per review block.
//!
//! Each strategy is a pure function of the block: it either returns a
//! rating or declines. Nothing is shared between strategies, so the first
//! one to answer decides and the rest never run.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::models::{Rating, RatingSource};
use crate::parsing_modules::json_ld_parser::StructuredReview;

lazy_static! {
    static ref RATING_VALUE: Selector =
        Selector::parse(r#"[itemprop="ratingValue"]"#).expect("Invalid ratingValue selector");
    static ref ANY_ELEMENT: Selector = Selector::parse("*").expect("Invalid wildcard selector");

    static ref OUT_OF_FIVE: Regex =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:out\s+of|/)\s*5(?:\.0)?(?:[^\d/]|$)").expect("Invalid out-of regex");
    static ref RATED_NUMBER: Regex =
        Regex::new(r"(?i)\brated\s*:?\s*(\d+(?:\.\d+)?)").expect("Invalid rated regex");
    static ref NUMBER_STARS: Regex =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*-?\s*stars?\b").expect("Invalid stars regex");
    static ref VERBAL_STARS: Regex =
        Regex::new(r"(?i)\b(one|two|three|four|five)\s*-?\s*stars?\b").expect("Invalid verbal stars regex");
    static ref RATED_VERBAL: Regex =
        Regex::new(r"(?i)\brated\s+(one|two|three|four|five)\b").expect("Invalid verbal rated regex");
    static ref BARE_NUMBER: Regex = Regex::new(r"\d+(?:\.\d+)?").expect("Invalid number regex");
}

/// A rating and the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingResult {
    pub rating: Rating,
    pub source: RatingSource,
}

/// One review block as seen by the strategies.
#[derive(Debug, Clone)]
pub struct ReviewBlock<'a> {
    pub element: ElementRef<'a>,
    /// Reviewer name already extracted from the block, used to match JSON-LD.
    pub reviewer: Option<String>,
    /// Reviews from the page's JSON-LD listing.
    pub structured: &'a [StructuredReview],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingStrategy {
    StructuredData,
    TextPattern,
    Glyph,
    NumericFallback,
}

impl RatingStrategy {
    /// Priority order. Changing it changes which signal wins.
    pub const CHAIN: [RatingStrategy; 4] = [
        RatingStrategy::StructuredData,
        RatingStrategy::TextPattern,
        RatingStrategy::Glyph,
        RatingStrategy::NumericFallback,
    ];

    pub fn source(self) -> RatingSource {
        match self {
            RatingStrategy::StructuredData => RatingSource::Structured,
            RatingStrategy::TextPattern => RatingSource::Text,
            RatingStrategy::Glyph => RatingSource::Glyph,
            RatingStrategy::NumericFallback => RatingSource::Fallback,
        }
    }

    pub fn extract(self, block: &ReviewBlock) -> Option<RatingResult> {
        let rating = match self {
            RatingStrategy::StructuredData => structured_rating(block),
            RatingStrategy::TextPattern => text_rating(block),
            RatingStrategy::Glyph => glyph_rating(block),
            RatingStrategy::NumericFallback => fallback_rating(block),
        }?;
        Some(RatingResult {
            rating,
            source: self.source(),
        })
    }
}

/// Runs `chain` in order and returns the first answer, or `(None, None)`.
pub fn resolve(chain: &[RatingStrategy], block: &ReviewBlock) -> (Option<Rating>, RatingSource) {
    for strategy in chain {
        if let Some(result) = strategy.extract(block) {
            tracing::trace!(strategy = result.source.as_str(), rating = %result.rating, "Rating resolved");
            return (Some(result.rating), result.source);
        }
    }
    (None, RatingSource::None)
}

// --- StructuredData ---------------------------------------------------------

fn structured_rating(block: &ReviewBlock) -> Option<Rating> {
    microdata_rating(block).or_else(|| json_ld_rating(block))
}

fn microdata_rating(block: &ReviewBlock) -> Option<Rating> {
    block.element.select(&RATING_VALUE).find_map(|el| {
        let raw = el
            .value()
            .attr("content")
            .map(str::to_string)
            .unwrap_or_else(|| el.text().collect::<String>());
        raw.trim().parse::<f64>().ok().and_then(Rating::new)
    })
}

/// Matches the block's reviewer against JSON-LD review authors. Declines
/// when the author has several JSON-LD reviews that disagree.
fn json_ld_rating(block: &ReviewBlock) -> Option<Rating> {
    let reviewer = normalize_name(block.reviewer.as_deref()?);
    if reviewer.is_empty() {
        return None;
    }

    let mut matched: Option<Rating> = None;
    for review in block.structured {
        let Some(author) = review.author.as_deref() else {
            continue;
        };
        if normalize_name(author) != reviewer {
            continue;
        }
        let Some(rating) = review.rating else {
            continue;
        };
        match matched {
            Some(existing) if existing != rating => return None,
            _ => matched = Some(rating),
        }
    }
    matched
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

// --- TextPattern ------------------------------------------------------------

fn text_rating(block: &ReviewBlock) -> Option<Rating> {
    let corpus = text_corpus(block.element);

    for pattern in [&*OUT_OF_FIVE, &*RATED_NUMBER, &*NUMBER_STARS] {
        let found = pattern
            .captures_iter(&corpus)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<f64>().ok())
            .find_map(platform_scale);
        if found.is_some() {
            return found;
        }
    }

    for pattern in [&*VERBAL_STARS, &*RATED_VERBAL] {
        let found = pattern
            .captures_iter(&corpus)
            .filter_map(|caps| word_to_number(caps.get(1)?.as_str()))
            .find_map(platform_scale);
        if found.is_some() {
            return found;
        }
    }

    None
}

/// Visible text plus `aria-label` / `title` attributes, which is where
/// icon-only ratings usually spell themselves out.
fn text_corpus(element: ElementRef) -> String {
    let mut corpus = element.text().collect::<Vec<_>>().join(" ");
    for el in element.select(&ANY_ELEMENT) {
        for attr in ["aria-label", "title"] {
            if let Some(label) = el.value().attr(attr) {
                corpus.push_str(" | ");
                corpus.push_str(label);
            }
        }
    }
    corpus
}

fn word_to_number(word: &str) -> Option<f64> {
    match word.to_ascii_lowercase().as_str() {
        "one" => Some(1.0),
        "two" => Some(2.0),
        "three" => Some(3.0),
        "four" => Some(4.0),
        "five" => Some(5.0),
        _ => None,
    }
}

/// Free-text and fallback values must sit on the 1-5 review scale.
fn platform_scale(value: f64) -> Option<Rating> {
    if (1.0..=Rating::MAX).contains(&value) {
        Rating::new(value)
    } else {
        None
    }
}

// --- Glyph ------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlyphState {
    Filled,
    Half,
    Empty,
    /// A star element drawing its stars as text (`★★★☆☆`): the filled count.
    Text(usize),
}

impl GlyphState {
    fn value(self) -> f64 {
        match self {
            GlyphState::Filled => 1.0,
            GlyphState::Half => 0.5,
            GlyphState::Empty => 0.0,
            GlyphState::Text(filled) => filled as f64,
        }
    }
}

const FILLED_MARKERS: &[&str] = &["filled", "fill", "full", "active", "selected", "on", "checked"];
const EMPTY_MARKERS: &[&str] = &["empty", "outline", "off", "unfilled", "inactive", "blank"];
const MAX_GLYPHS: f64 = 5.0;

fn glyph_rating(block: &ReviewBlock) -> Option<Rating> {
    let states: Vec<GlyphState> = block
        .element
        .select(&ANY_ELEMENT)
        .filter(|el| el.id() != block.element.id())
        .filter(|el| is_star_element(el) && !has_star_descendant(el))
        .filter_map(|el| glyph_state(&el))
        .collect();

    let value = if states.is_empty() {
        text_glyph_count(block.element)?
    } else {
        states.iter().map(|state| state.value()).sum()
    };

    if value <= 0.0 || value > MAX_GLYPHS {
        return None;
    }
    Rating::new(value)
}

fn class_tokens(el: &ElementRef) -> Vec<String> {
    el.value()
        .attr("class")
        .unwrap_or_default()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn is_star_element(el: &ElementRef) -> bool {
    let class_match = class_tokens(el)
        .iter()
        .any(|t| t.starts_with("star") && !t.starts_with("start"));
    let attr_match = ["aria-label", "data-icon"].iter().any(|attr| {
        el.value()
            .attr(attr)
            .is_some_and(|v| v.to_ascii_lowercase().contains("star"))
    });
    class_match || attr_match
}

fn has_star_descendant(el: &ElementRef) -> bool {
    el.select(&ANY_ELEMENT)
        .any(|child| child.id() != el.id() && is_star_element(&child))
}

/// `None` for star-named elements that carry a number (a score badge, not an icon).
fn glyph_state(el: &ElementRef) -> Option<GlyphState> {
    let text = el.text().collect::<String>();
    if text.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if text.chars().any(is_text_glyph) {
        return Some(GlyphState::Text(count_filled_glyphs(&text)));
    }

    let tokens = class_tokens(el);
    let has = |markers: &[&str]| tokens.iter().any(|t| markers.contains(&t.as_str()));
    let data_state = el
        .value()
        .attr("data-state")
        .or_else(|| el.value().attr("data-fill"))
        .map(str::to_ascii_lowercase);

    if tokens.iter().any(|t| t.contains("half")) || data_state.as_deref() == Some("half") {
        return Some(GlyphState::Half);
    }
    if has(EMPTY_MARKERS) || matches!(data_state.as_deref(), Some("empty" | "off")) {
        return Some(GlyphState::Empty);
    }
    if has(FILLED_MARKERS) {
        return Some(GlyphState::Filled);
    }
    // Unmarked icons count as filled: sites that render empty stars mark them.
    Some(GlyphState::Filled)
}

fn is_text_glyph(c: char) -> bool {
    matches!(c, '★' | '⭐' | '☆')
}

fn count_filled_glyphs(text: &str) -> usize {
    text.chars().filter(|c| matches!(c, '★' | '⭐')).count()
}

/// Counts `★`/`⭐` characters when the block has no star elements.
fn text_glyph_count(element: ElementRef) -> Option<f64> {
    let filled = count_filled_glyphs(&element.text().collect::<String>());
    if filled == 0 {
        return None;
    }
    Some(filled as f64)
}

// --- NumericFallback --------------------------------------------------------

const FALLBACK_HINTS: &[&str] = &["rating", "rate", "score"];

fn fallback_rating(block: &ReviewBlock) -> Option<Rating> {
    block
        .element
        .select(&ANY_ELEMENT)
        .filter(|el| el.id() != block.element.id())
        .filter(is_rating_adjacent)
        .find_map(|el| {
            let text = el.text().collect::<String>();
            BARE_NUMBER
                .find_iter(&text)
                .filter_map(|m| m.as_str().parse::<f64>().ok())
                .find_map(platform_scale)
        })
}

fn is_rating_adjacent(el: &ElementRef) -> bool {
    ["class", "id", "data-testid", "aria-label"].iter().any(|attr| {
        el.value().attr(attr).is_some_and(|v| {
            let v = v.to_ascii_lowercase();
            FALLBACK_HINTS.iter().any(|hint| v.contains(hint))
        })
    })
}
