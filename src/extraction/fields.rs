//! Non-rating fields of a review block: reviewer, text, date and channel.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::models::{Channel, RelativeUnit, ReviewDate};

lazy_static! {
    static ref REVIEWER_SELECTORS: Vec<Selector> = [
        r#"[itemprop="author"] [itemprop="name"]"#,
        r#"[itemprop="author"]"#,
        r#"[data-testid="reviewer-name"]"#,
        r#"[class*="reviewer"]"#,
        r#"[class*="user-name"]"#,
        r#"[class*="userName"]"#,
        r#"[class*="author"]"#,
        r#"a[href*="/users/"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Invalid reviewer selector"))
    .collect();

    static ref TEXT_SELECTORS: Vec<Selector> = [
        r#"[itemprop="reviewBody"]"#,
        r#"[itemprop="description"]"#,
        r#"[data-testid="review-text"]"#,
        r#"[class*="review-text"]"#,
        r#"[class*="reviewText"]"#,
        r#"[class*="review-body"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Invalid review text selector"))
    .collect();

    static ref PARAGRAPHS: Selector = Selector::parse("p").expect("Invalid paragraph selector");

    static ref DATE_SELECTORS: Vec<Selector> = [
        "time",
        r#"[itemprop="datePublished"]"#,
        r#"[class*="time-stamp"]"#,
        r#"[class*="timestamp"]"#,
        r#"[class*="date"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("Invalid date selector"))
    .collect();

    static ref TEXT_LEAVES: Selector = Selector::parse("p, span, div").expect("Invalid leaf selector");

    static ref CHANNEL_LABELS: Selector = Selector::parse(
        r#"[data-channel], [data-rating-type], [class*="rating-type"], [class*="ratingType"], [class*="channel"]"#
    )
    .expect("Invalid channel selector");

    static ref RELATIVE_DATE: Regex = Regex::new(
        r"(?i)\b(\d+|an?|one)\s+(minute|min|hour|hr|day|week|month|year)s?\s+ago\b"
    )
    .expect("Invalid relative date regex");
    static ref ISO_DATE: Regex = Regex::new(r"\b(\d{4}-\d{2}-\d{2})").expect("Invalid ISO date regex");
    static ref CHANNEL_TOKEN: Regex = Regex::new(r"\b(DINING|DELIVERY)\b").expect("Invalid channel regex");
}

const MAX_REVIEWER_LEN: usize = 100;
const MIN_TEXT_LEN: usize = 10;
const MAX_TIMESTAMP_LEN: usize = 32;
const ABSOLUTE_FORMATS: &[&str] = &["%b %d, %Y", "%B %d, %Y", "%d %B %Y", "%d %b %Y", "%d/%m/%Y", "%b %d %Y"];

pub(crate) fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(el: &ElementRef) -> String {
    collapse(&el.text().collect::<Vec<_>>().join(" "))
}

pub fn extract_reviewer(block: ElementRef) -> Option<String> {
    REVIEWER_SELECTORS.iter().find_map(|selector| {
        block
            .select(selector)
            .filter(|el| el.id() != block.id())
            .map(|el| element_text(&el))
            .find(|name| !name.is_empty() && name.len() <= MAX_REVIEWER_LEN)
    })
}

/// Review body: a dedicated text element, else the longest paragraph that is
/// not the reviewer line or a date.
pub fn extract_text(block: ElementRef, reviewer: Option<&str>) -> Option<String> {
    let dedicated = TEXT_SELECTORS.iter().find_map(|selector| {
        block
            .select(selector)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    });
    if dedicated.is_some() {
        return dedicated;
    }

    block
        .select(&PARAGRAPHS)
        .map(|el| element_text(&el))
        .filter(|text| text.chars().count() > MIN_TEXT_LEN)
        .filter(|text| Some(text.as_str()) != reviewer)
        .filter(|text| !RELATIVE_DATE.is_match(text))
        .max_by_key(|text| text.len())
}

pub fn extract_date(block: ElementRef) -> Option<ReviewDate> {
    for selector in DATE_SELECTORS.iter() {
        for el in block.select(selector) {
            let raw = el
                .value()
                .attr("datetime")
                .or_else(|| el.value().attr("content"))
                .map(str::to_string)
                .unwrap_or_else(|| element_text(&el));
            if let Some(date) = parse_review_date(&raw) {
                return Some(date);
            }
        }
    }

    // Unlabelled timestamps ("3 days ago") sitting in a plain leaf.
    block
        .select(&TEXT_LEAVES)
        .filter(|el| el.children().all(|c| c.value().is_text()))
        .map(|el| element_text(&el))
        .find_map(|text| parse_timestamp_leaf(&text))
}

/// Accepts a leaf only when its whole text is a relative timestamp, so a
/// review body mentioning "today" is never read as the date.
fn parse_timestamp_leaf(text: &str) -> Option<ReviewDate> {
    if text.is_empty() || text.chars().count() > MAX_TIMESTAMP_LEN {
        return None;
    }
    let lower = text.to_lowercase();
    let lower = lower.trim_end_matches('.');
    let whole = matches!(lower, "today" | "yesterday" | "just now")
        || RELATIVE_DATE
            .find(lower)
            .is_some_and(|m| m.start() == 0 && m.end() == lower.len());
    if whole { parse_relative(lower) } else { None }
}

/// Parses a displayed date. Relative phrases stay relative; unparseable but
/// date-like text is kept raw; anything else is `None`.
pub fn parse_review_date(raw: &str) -> Option<ReviewDate> {
    let text = collapse(raw);
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_relative(&text) {
        return Some(date);
    }

    if let Some(caps) = ISO_DATE.captures(&text) {
        if let Ok(value) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
            return Some(ReviewDate::Date { value });
        }
    }

    let cleaned = text
        .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
        .trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
    for format in ABSOLUTE_FORMATS {
        if let Ok(value) = NaiveDate::parse_from_str(cleaned, format) {
            return Some(ReviewDate::Date { value });
        }
    }

    looks_like_date(&text).then(|| ReviewDate::Raw { text })
}

fn parse_relative(text: &str) -> Option<ReviewDate> {
    let lower = text.to_lowercase();
    if lower.contains("yesterday") {
        return Some(ReviewDate::Relative {
            amount: 1,
            unit: RelativeUnit::Day,
        });
    }
    if lower.contains("today") || lower.contains("just now") {
        return Some(ReviewDate::Relative {
            amount: 0,
            unit: RelativeUnit::Day,
        });
    }

    let caps = RELATIVE_DATE.captures(&lower)?;
    let amount = match &caps[1] {
        "a" | "an" | "one" => 1,
        digits => digits.parse().ok()?,
    };
    let unit = match &caps[2] {
        "minute" | "min" => RelativeUnit::Minute,
        "hour" | "hr" => RelativeUnit::Hour,
        "day" => RelativeUnit::Day,
        "week" => RelativeUnit::Week,
        "month" => RelativeUnit::Month,
        "year" => RelativeUnit::Year,
        _ => return None,
    };
    Some(ReviewDate::Relative { amount, unit })
}

fn looks_like_date(text: &str) -> bool {
    const MONTHS: &[&str] = &[
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = text.to_lowercase();
    text.len() <= 40
        && (lower.chars().any(|c| c.is_ascii_digit())
            && (MONTHS.iter().any(|m| lower.contains(m)) || lower.contains('/') || lower.contains('-')))
}

/// Dining vs delivery from block-local markers. Never fails.
pub fn classify_channel(block: ElementRef) -> Channel {
    let mut labels: Vec<String> = Vec::new();
    for el in block.select(&CHANNEL_LABELS) {
        for attr in ["data-channel", "data-rating-type"] {
            if let Some(value) = el.value().attr(attr) {
                labels.push(value.to_string());
            }
        }
        labels.push(element_text(&el));
    }
    if let Some(channel) = labels.iter().find_map(|label| channel_from_label(label)) {
        return channel;
    }

    let text = block.text().collect::<Vec<_>>().join(" ");
    let tokens: Vec<&str> = CHANNEL_TOKEN.find_iter(&text).map(|m| m.as_str()).collect();
    match (tokens.contains(&"DINING"), tokens.contains(&"DELIVERY")) {
        (true, false) => Channel::Dining,
        (false, true) => Channel::Delivery,
        _ => Channel::Unknown,
    }
}

fn channel_from_label(label: &str) -> Option<Channel> {
    let lower = label.to_lowercase();
    match (lower.contains("dining") || lower.contains("dine"), lower.contains("delivery")) {
        (true, false) => Some(Channel::Dining),
        (false, true) => Some(Channel::Delivery),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn with_section<T>(html: &str, f: impl FnOnce(ElementRef) -> T) -> T {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse("section").unwrap();
        f(document.select(&selector).next().unwrap())
    }

    #[test]
    fn test_reviewer_and_text() {
        let html = r#"<section>
            <a href="/users/asha-123" class="profile">Asha Kulkarni</a>
            <p>12 Reviews</p>
            <p>3 days ago</p>
            <p>The prawn curry was excellent, service a bit slow.</p>
        </section>"#;
        with_section(html, |block| {
            let reviewer = extract_reviewer(block);
            assert_eq!(reviewer.as_deref(), Some("Asha Kulkarni"));
            assert_eq!(
                extract_text(block, reviewer.as_deref()).as_deref(),
                Some("The prawn curry was excellent, service a bit slow.")
            );
        });
    }

    #[test]
    fn test_dedicated_text_element_preferred() {
        let html = r#"<section><div itemprop="reviewBody">Short one</div><p>A much longer paragraph here</p></section>"#;
        with_section(html, |block| {
            assert_eq!(extract_text(block, None).as_deref(), Some("Short one"));
        });
    }

    #[test]
    fn test_parse_review_date_forms() {
        let date = |y, m, d| ReviewDate::Date {
            value: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        };
        assert_eq!(parse_review_date("2023-01-12T10:00:00Z"), Some(date(2023, 1, 12)));
        assert_eq!(parse_review_date("Jan 12, 2023"), Some(date(2023, 1, 12)));
        assert_eq!(parse_review_date("12 January 2023"), Some(date(2023, 1, 12)));
        assert_eq!(parse_review_date("12/01/2023"), Some(date(2023, 1, 12)));
        assert_eq!(
            parse_review_date("3 days ago"),
            Some(ReviewDate::Relative {
                amount: 3,
                unit: RelativeUnit::Day
            })
        );
        assert_eq!(
            parse_review_date("one month ago"),
            Some(ReviewDate::Relative {
                amount: 1,
                unit: RelativeUnit::Month
            })
        );
        assert_eq!(
            parse_review_date("Yesterday"),
            Some(ReviewDate::Relative {
                amount: 1,
                unit: RelativeUnit::Day
            })
        );
        assert_eq!(
            parse_review_date("Sept 31st, 2023"),
            Some(ReviewDate::Raw {
                text: "Sept 31st, 2023".to_string()
            })
        );
        assert_eq!(parse_review_date("Great food"), None);
        assert_eq!(parse_review_date("   "), None);
    }

    #[test]
    fn test_extract_date_from_block() {
        with_section(r#"<section><time datetime="2023-05-02">May 2</time></section>"#, |block| {
            assert_eq!(extract_date(block).map(|d| d.canonical()), Some("2023-05-02".to_string()));
        });
        with_section(r#"<section><p>Asha</p><span>2 weeks ago</span></section>"#, |block| {
            assert_eq!(extract_date(block).map(|d| d.canonical()), Some("2 weeks ago".to_string()));
        });
        with_section(r#"<section><p>No date at all</p></section>"#, |block| {
            assert!(extract_date(block).is_none());
        });
    }

    #[test]
    fn test_body_mentioning_today_is_not_the_date() {
        let html = r#"<section>
            <p>We went there today and the biryani was still great, 2 days ago it was better.</p>
            <span>3 days ago</span>
        </section>"#;
        with_section(html, |block| {
            assert_eq!(
                extract_date(block),
                Some(ReviewDate::Relative {
                    amount: 3,
                    unit: RelativeUnit::Day,
                })
            );
        });
        with_section(r#"<section><p>Loved it today</p></section>"#, |block| {
            assert!(extract_date(block).is_none());
        });
        with_section(r#"<section><span>Yesterday</span></section>"#, |block| {
            assert_eq!(extract_date(block).map(|d| d.canonical()), Some("1 day ago".to_string()));
        });
    }

    #[test]
    fn test_classify_channel() {
        with_section(r#"<section><div class="rating-type">DELIVERY</div></section>"#, |block| {
            assert_eq!(classify_channel(block), Channel::Delivery);
        });
        with_section(r#"<section data-x="1"><span data-channel="dining"></span></section>"#, |block| {
            assert_eq!(classify_channel(block), Channel::Dining);
        });
        with_section(r#"<section><p>4.0 DINING</p></section>"#, |block| {
            assert_eq!(classify_channel(block), Channel::Dining);
        });
        with_section(r#"<section><p>DINING and DELIVERY</p></section>"#, |block| {
            assert_eq!(classify_channel(block), Channel::Unknown);
        });
        with_section(r#"<section><p>we ordered delivery</p></section>"#, |block| {
            assert_eq!(classify_channel(block), Channel::Unknown);
        });
    }
}
