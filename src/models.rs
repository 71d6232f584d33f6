use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::dedup::DedupKey;
use crate::error::{ConfigError, PageError, PageFailure};
use crate::url_utils;

/// A star rating on the platform's 0-5 scale, rounded to one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rating(f64);

impl Rating {
    pub const MAX: f64 = 5.0;

    /// Returns `None` for NaN, infinities and anything outside [0, 5].
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=Self::MAX).contains(&value) {
            Some(Self((value * 10.0).round() / 10.0))
        } else {
            None
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Rating {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or_else(|| format!("rating {} outside [0, 5]", value))
    }
}

impl From<Rating> for f64 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

/// Which strategy produced a rating. Variant order is confidence order:
/// `Structured > Text > Glyph > Fallback > None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingSource {
    None,
    Fallback,
    Glyph,
    Text,
    Structured,
}

impl RatingSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RatingSource::None => "none",
            RatingSource::Fallback => "fallback",
            RatingSource::Glyph => "glyph",
            RatingSource::Text => "text",
            RatingSource::Structured => "structured",
        }
    }
}

impl fmt::Display for RatingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a review is about eating in or ordering delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Dining,
    Delivery,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl RelativeUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            RelativeUnit::Minute => "minute",
            RelativeUnit::Hour => "hour",
            RelativeUnit::Day => "day",
            RelativeUnit::Week => "week",
            RelativeUnit::Month => "month",
            RelativeUnit::Year => "year",
        }
    }
}

/// Review date as shown on the page.
///
/// Relative dates ("3 days ago") are kept relative: resolving them against
/// the wall clock would make repeated extraction of the same page disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewDate {
    Date { value: NaiveDate },
    Relative { amount: u32, unit: RelativeUnit },
    Raw { text: String },
}

impl ReviewDate {
    /// Stable textual form used for dedup keys and flat exports.
    pub fn canonical(&self) -> String {
        match self {
            ReviewDate::Date { value } => value.format("%Y-%m-%d").to_string(),
            ReviewDate::Relative { amount, unit } => {
                let plural = if *amount == 1 { "" } else { "s" };
                format!("{} {}{} ago", amount, unit.as_str(), plural)
            }
            ReviewDate::Raw { text } => text.trim().to_lowercase(),
        }
    }
}

/// One review as extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCandidate {
    pub reviewer: Option<String>,
    pub rating: Option<Rating>,
    pub text: Option<String>,
    pub date: Option<ReviewDate>,
    pub channel: Channel,
    pub page_index: u32,
    /// Provenance of `rating`; doubles as the confidence ordinal.
    pub strategy: RatingSource,
}

impl ReviewCandidate {
    pub fn confidence(&self) -> RatingSource {
        self.strategy
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::for_candidate(self)
    }

    /// Checks the record-level invariants: a rating is present exactly when a
    /// strategy resolved it, and page indices start at 1.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.page_index == 0 {
            return Err(SchemaViolation::ZeroPageIndex);
        }
        match (self.rating, self.strategy) {
            (Some(_), RatingSource::None) => Err(SchemaViolation::RatingWithoutStrategy),
            (None, source) if source != RatingSource::None => {
                Err(SchemaViolation::StrategyWithoutRating(source))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaViolation {
    #[error("rating present but strategy is 'none'")]
    RatingWithoutStrategy,
    #[error("strategy '{0}' recorded without a rating")]
    StrategyWithoutRating(RatingSource),
    #[error("page index must start at 1")]
    ZeroPageIndex,
    #[error("duplicate dedup key in final result")]
    DuplicateKey,
    #[error("reviews or errors are out of page order")]
    UnorderedPages,
}

/// A restaurant to crawl, validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RestaurantTarget {
    pub location: String,
    pub slug: String,
}

impl RestaurantTarget {
    pub fn new(location: &str, slug: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            location: url_utils::validate_identifier("location", location)?,
            slug: url_utils::validate_identifier("slug", slug)?,
        })
    }
}

impl fmt::Display for RestaurantTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.slug)
    }
}

/// Restaurant metadata scraped from the first review page of a crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantInfo {
    pub slug: String,
    pub location: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub cuisines: Vec<String>,
    pub aggregate_rating: Option<Rating>,
    pub review_count: Option<u32>,
}

impl RestaurantInfo {
    /// Placeholder used when the first page never parsed.
    pub fn unresolved(target: &RestaurantTarget) -> Self {
        Self {
            slug: target.slug.clone(),
            location: target.location.clone(),
            name: None,
            address: None,
            cuisines: Vec::new(),
            aggregate_rating: None,
            review_count: None,
        }
    }
}

/// Outcome of visiting one page during pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFetchResult {
    pub page_index: u32,
    pub url: String,
    pub content: Result<String, PageFailure>,
    /// `None` means this page did not point anywhere further.
    pub next_link: Option<String>,
}

impl PageFetchResult {
    pub fn is_ok(&self) -> bool {
        self.content.is_ok()
    }
}

/// Why the pagination walker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoNextPage,
    MaxPages,
    Cycle,
    Unrecoverable,
}

/// Terminal output of one restaurant crawl, handed to the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub restaurant: RestaurantInfo,
    pub reviews: Vec<ReviewCandidate>,
    pub pages_fetched: u32,
    pub pages_discovered: u32,
    pub errors: Vec<PageError>,
    pub success: bool,
    pub stop_reason: StopReason,
}

impl CrawlResult {
    /// Result for a restaurant whose crawl could not even start.
    pub fn failed(target: &RestaurantTarget, error: PageError) -> Self {
        Self {
            restaurant: RestaurantInfo::unresolved(target),
            reviews: Vec::new(),
            pages_fetched: 0,
            pages_discovered: 0,
            errors: vec![error],
            success: false,
            stop_reason: StopReason::Unrecoverable,
        }
    }

    pub fn rated_reviews(&self) -> usize {
        self.reviews.iter().filter(|r| r.rating.is_some()).count()
    }

    /// Checks the invariants of a finished crawl.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        let mut keys = HashSet::with_capacity(self.reviews.len());
        for review in &self.reviews {
            review.validate()?;
            if !keys.insert(review.dedup_key()) {
                return Err(SchemaViolation::DuplicateKey);
            }
        }
        let reviews_ordered = self
            .reviews
            .windows(2)
            .all(|pair| pair[0].page_index <= pair[1].page_index);
        let errors_ordered = self
            .errors
            .windows(2)
            .all(|pair| pair[0].page_index <= pair[1].page_index);
        if !reviews_ordered || !errors_ordered {
            return Err(SchemaViolation::UnorderedPages);
        }
        Ok(())
    }
}
