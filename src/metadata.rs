//! Restaurant metadata extraction from the first review page.
//!
//! Sources, in order of trust:
//! - JSON-LD listing data (Schema.org)
//! - Schema.org microdata (`itemprop`)
//! - OpenGraph and standard HTML tags

use lazy_static::lazy_static;
use scraper::{Html, Selector};

use crate::models::{Rating, RestaurantInfo, RestaurantTarget};
use crate::parsing_modules::json_ld_parser::ListingData;

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect("Invalid title selector");
    static ref H1: Selector = Selector::parse("h1").expect("Invalid h1 selector");
    static ref OG_TITLE: Selector =
        Selector::parse(r#"meta[property="og:title"]"#).expect("Invalid og:title selector");
    static ref ITEMPROP_NAME: Selector =
        Selector::parse(r#"[itemtype*="Restaurant"] [itemprop="name"]"#).expect("Invalid name selector");
    static ref ITEMPROP_ADDRESS: Selector =
        Selector::parse(r#"[itemprop="address"]"#).expect("Invalid address selector");
    static ref ITEMPROP_CUISINE: Selector =
        Selector::parse(r#"[itemprop="servesCuisine"]"#).expect("Invalid cuisine selector");
    static ref CUISINE_LINKS: Selector =
        Selector::parse(r#"a[href*="cuisine"]"#).expect("Invalid cuisine link selector");
    static ref AGGREGATE_VALUE: Selector =
        Selector::parse(r#"[itemprop="aggregateRating"] [itemprop="ratingValue"]"#)
            .expect("Invalid aggregate rating selector");
    static ref AGGREGATE_COUNT: Selector =
        Selector::parse(r#"[itemprop="aggregateRating"] [itemprop="reviewCount"], [itemprop="aggregateRating"] [itemprop="ratingCount"]"#)
            .expect("Invalid review count selector");
}

/// Builds the restaurant record for one crawl. Fields that cannot be found
/// stay empty; this never fails.
pub fn extract_restaurant_info(
    document: &Html,
    listing: Option<&ListingData>,
    target: &RestaurantTarget,
) -> RestaurantInfo {
    let mut info = RestaurantInfo::unresolved(target);

    if let Some(listing) = listing {
        info.name = listing.name.clone();
        info.address = listing.address.clone();
        info.cuisines = listing.cuisines.clone();
        info.aggregate_rating = listing.aggregate_rating;
        info.review_count = listing.review_count;
    }

    if info.name.is_none() {
        info.name = first_text(document, &ITEMPROP_NAME)
            .or_else(|| og_title(document))
            .or_else(|| first_text(document, &H1))
            .or_else(|| first_text(document, &TITLE).map(|t| strip_title_suffix(&t)));
    }

    if info.address.is_none() {
        info.address = first_text(document, &ITEMPROP_ADDRESS);
    }

    if info.cuisines.is_empty() {
        info.cuisines = all_text(document, &ITEMPROP_CUISINE);
    }
    if info.cuisines.is_empty() {
        info.cuisines = all_text(document, &CUISINE_LINKS);
    }

    if info.aggregate_rating.is_none() {
        info.aggregate_rating = first_value(document, &AGGREGATE_VALUE)
            .and_then(|v| v.parse::<f64>().ok())
            .and_then(Rating::new);
    }

    if info.review_count.is_none() {
        info.review_count = first_value(document, &AGGREGATE_COUNT).and_then(|v| {
            let digits: String = v.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        });
    }

    info
}

fn og_title(document: &Html) -> Option<String> {
    document
        .select(&OG_TITLE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| strip_title_suffix(s.trim()))
        .filter(|s| !s.is_empty())
}

/// "Foo Kopa, Mundhwa, Pune | Zomato" -> "Foo Kopa"
fn strip_title_suffix(title: &str) -> String {
    let head = title.split('|').next().unwrap_or(title);
    let head = head.split(',').next().unwrap_or(head);
    head.trim().to_string()
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| collapse(&el.text().collect::<String>()))
        .find(|s| !s.is_empty())
}

/// `content` attribute first (microdata on `<meta>`), then element text.
fn first_value(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).find_map(|el| {
        el.value()
            .attr("content")
            .map(|s| s.trim().to_string())
            .or_else(|| Some(collapse(&el.text().collect::<String>())))
            .filter(|s| !s.is_empty())
    })
}

fn all_text(document: &Html, selector: &Selector) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for text in document.select(selector).map(|el| collapse(&el.text().collect::<String>())) {
        if !text.is_empty() && !values.contains(&text) {
            values.push(text);
        }
    }
    values
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
