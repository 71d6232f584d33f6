//! Schema.org JSON-LD listing extraction.
//!
//! Listing pages embed a machine-readable description of the restaurant for
//! search engines:
//! ```html
//! <script type="application/ld+json">
//! {
//!   "@type": "Restaurant",
//!   "name": "Foo Kopa",
//!   "aggregateRating": { "ratingValue": "4.2", "reviewCount": "310" },
//!   "review": [
//!     { "author": { "name": "Asha" },
//!       "reviewRating": { "ratingValue": 4.5 },
//!       "reviewBody": "Loved it" }
//!   ]
//! }
//! </script>
//! ```
//!
//! This is the authoritative rating source when present, so it is read
//! before any visual parsing.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::models::Rating;

lazy_static! {
    static ref JSON_LD_SELECTOR: Selector =
        Selector::parse(r#"script[type="application/ld+json"]"#).expect("Invalid JSON-LD selector");
}

const LISTING_TYPES: &[&str] = &["Restaurant", "FoodEstablishment", "LocalBusiness"];

/// Listing data found in the page's JSON-LD.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingData {
    pub name: Option<String>,
    pub address: Option<String>,
    pub cuisines: Vec<String>,
    pub aggregate_rating: Option<Rating>,
    pub review_count: Option<u32>,
    pub reviews: Vec<StructuredReview>,
}

/// One review embedded in the listing's JSON-LD.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredReview {
    pub author: Option<String>,
    pub rating: Option<Rating>,
    pub body: Option<String>,
    pub date_published: Option<String>,
}

/// Returns every JSON-LD node on the page, flattening top-level arrays and
/// `@graph` containers. Blocks that are not valid JSON are skipped.
pub fn extract_json_ld_nodes(document: &Html) -> Vec<Value> {
    let mut nodes = Vec::new();

    for element in document.select(&JSON_LD_SELECTOR) {
        let text = element.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
            tracing::debug!("Skipping malformed JSON-LD block");
            continue;
        };
        flatten_into(value, &mut nodes);
    }

    nodes
}

fn flatten_into(value: Value, nodes: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, nodes);
            }
        }
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_into(graph, nodes);
            }
            if !map.is_empty() {
                nodes.push(Value::Object(map));
            }
        }
        _ => {}
    }
}

/// Finds the first restaurant-typed JSON-LD node and reads the listing out of it.
pub fn extract_listing(document: &Html) -> Option<ListingData> {
    let nodes = extract_json_ld_nodes(document);
    let listing = nodes.iter().find(|node| is_listing(node))?;

    let aggregate = listing.get("aggregateRating");
    let reviews = listing
        .get("review")
        .or_else(|| listing.get("reviews"))
        .map(parse_reviews)
        .unwrap_or_default();

    Some(ListingData {
        name: listing.get("name").and_then(as_text),
        address: listing.get("address").and_then(parse_address),
        cuisines: listing
            .get("servesCuisine")
            .map(parse_string_list)
            .unwrap_or_default(),
        aggregate_rating: aggregate
            .and_then(|a| a.get("ratingValue"))
            .and_then(as_number)
            .and_then(Rating::new),
        review_count: aggregate
            .and_then(|a| a.get("reviewCount").or_else(|| a.get("ratingCount")))
            .and_then(as_number)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32),
        reviews,
    })
}

fn is_listing(node: &Value) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => LISTING_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| LISTING_TYPES.contains(&t)),
        _ => false,
    }
}

fn parse_reviews(value: &Value) -> Vec<StructuredReview> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single @ Value::Object(_) => vec![single],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|review| StructuredReview {
            author: review.get("author").and_then(parse_author),
            rating: review
                .get("reviewRating")
                .and_then(|r| r.get("ratingValue"))
                .and_then(as_number)
                .and_then(Rating::new),
            body: review
                .get("reviewBody")
                .or_else(|| review.get("description"))
                .and_then(as_text),
            date_published: review.get("datePublished").and_then(as_text),
        })
        .collect()
}

fn parse_author(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => value.get("name").and_then(as_text),
        Value::Array(items) => items.first().and_then(parse_author),
        other => as_text(other),
    }
}

fn parse_address(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => {
            let parts: Vec<String> = ["streetAddress", "addressLocality", "addressRegion"]
                .iter()
                .filter_map(|key| value.get(*key).and_then(as_text))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        other => as_text(other),
    }
}

fn parse_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_text).collect(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Non-empty trimmed string.
fn as_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Listing sites serialize numbers both as JSON numbers and as strings.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
