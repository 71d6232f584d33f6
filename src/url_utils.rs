//! URL utilities shared by the walker, the pagination parser and the CLI.

use url::Url;

use crate::error::ConfigError;
use crate::models::RestaurantTarget;

const MAX_IDENTIFIER_LEN: usize = 128;

/// Trailing path segments that name a tab of the listing rather than the restaurant.
const LISTING_SUFFIXES: &[&str] = &["info", "reviews", "menu", "photos", "order", "book"];

/// Normalizes and checks a location or slug: trimmed, lowercased, made of
/// ASCII letters, digits and inner hyphens.
pub fn validate_identifier(field: &'static str, value: &str) -> Result<String, ConfigError> {
    let normalized = value.trim().to_ascii_lowercase();
    let invalid = |reason| ConfigError::InvalidIdentifier {
        field,
        value: value.to_string(),
        reason,
    };

    if normalized.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if normalized.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid("too long"));
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(invalid("only lowercase letters, digits and '-' are allowed"));
    }
    if normalized.starts_with('-') || normalized.ends_with('-') {
        return Err(invalid("must not start or end with '-'"));
    }
    Ok(normalized)
}

/// `{base}/{location}/{slug}/reviews`
pub fn review_url(base_url: &str, target: &RestaurantTarget) -> String {
    format!(
        "{}/{}/{}/reviews",
        base_url.trim_end_matches('/'),
        target.location,
        target.slug
    )
}

/// Splits a listing URL such as `https://host/pune/cafe-one/info` into its
/// location and slug.
pub fn parse_restaurant_url(url: &str) -> Result<RestaurantTarget, ConfigError> {
    let unrecognized = || ConfigError::UnrecognizedRestaurantUrl(url.to_string());
    let parsed = Url::parse(url.trim()).map_err(|_| unrecognized())?;

    let mut segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    while segments
        .last()
        .is_some_and(|last| LISTING_SUFFIXES.contains(&last.to_ascii_lowercase().as_str()))
    {
        segments.pop();
    }

    if segments.len() < 2 {
        return Err(unrecognized());
    }
    let slug = segments[segments.len() - 1];
    let location = segments[segments.len() - 2];
    RestaurantTarget::new(location, slug)
}

/// Parses one batch input line: either `location,slug` or a listing URL.
/// Blank lines and `#` comments yield `None`.
pub fn parse_target_line(line: &str) -> Option<Result<RestaurantTarget, ConfigError>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line.starts_with("http://") || line.starts_with("https://") {
        return Some(parse_restaurant_url(line));
    }
    Some(match line.split_once(',') {
        Some((location, slug)) => RestaurantTarget::new(location, slug),
        None => Err(ConfigError::UnrecognizedRestaurantUrl(line.to_string())),
    })
}

pub fn convert_to_absolute_url(link: &str, base_url: &str) -> Result<String, String> {
    let base = Url::parse(base_url).map_err(|e| e.to_string())?;
    let absolute_url = base.join(link).map_err(|e| e.to_string())?;
    Ok(absolute_url.to_string())
}

/// Canonical form for the visited-link set: fragment dropped, query kept.
pub fn normalize_page_url(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Value of the `page` query parameter, if numeric.
pub fn page_number(url: &str) -> Option<u32> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse().ok())
}

/// Add https:// prefix for bare domains (CLI convenience).
pub fn normalize_url_for_cli(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }

    format!("https://{}", trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("location", " Pune "), Ok("pune".to_string()));
        assert_eq!(
            validate_identifier("slug", "foo-kopa-mundhwa"),
            Ok("foo-kopa-mundhwa".to_string())
        );
        assert!(validate_identifier("slug", "").is_err());
        assert!(validate_identifier("slug", "foo kopa").is_err());
        assert!(validate_identifier("slug", "../etc").is_err());
        assert!(validate_identifier("slug", "-foo").is_err());
    }

    #[test]
    fn test_review_url() {
        let target = RestaurantTarget::new("pune", "foo-kopa-mundhwa").unwrap();
        assert_eq!(
            review_url("https://www.zomato.com/", &target),
            "https://www.zomato.com/pune/foo-kopa-mundhwa/reviews"
        );
    }

    #[test]
    fn test_parse_restaurant_url() {
        let target = parse_restaurant_url("https://www.zomato.com/pune/foo-kopa-mundhwa/info").unwrap();
        assert_eq!(target.location, "pune");
        assert_eq!(target.slug, "foo-kopa-mundhwa");

        let target = parse_restaurant_url("https://www.zomato.com/mumbai/cafe-two/reviews/").unwrap();
        assert_eq!(target.location, "mumbai");
        assert_eq!(target.slug, "cafe-two");

        assert!(parse_restaurant_url("https://www.zomato.com/info").is_err());
        assert!(parse_restaurant_url("not-a-url").is_err());
    }

    #[test]
    fn test_parse_target_line() {
        assert!(parse_target_line("   ").is_none());
        assert!(parse_target_line("# comment").is_none());

        let target = parse_target_line("Pune,foo-kopa-mundhwa").unwrap().unwrap();
        assert_eq!(target.location, "pune");

        let target = parse_target_line("https://test.local/delhi/tea-house").unwrap().unwrap();
        assert_eq!(target.slug, "tea-house");

        assert!(parse_target_line("just-a-slug").unwrap().is_err());
    }

    #[test]
    fn test_normalize_page_url_drops_fragment() {
        assert_eq!(
            normalize_page_url("https://test.local/r/reviews?page=2#top"),
            "https://test.local/r/reviews?page=2"
        );
    }

    #[test]
    fn test_page_number() {
        assert_eq!(page_number("https://test.local/r?page=3&sort=dd"), Some(3));
        assert_eq!(page_number("https://test.local/r"), None);
        assert_eq!(page_number("https://test.local/r?page=abc"), None);
    }

    #[test]
    fn test_convert_to_absolute_url() {
        assert_eq!(
            convert_to_absolute_url("/pune/r/reviews?page=2", "https://test.local/pune/r/reviews").unwrap(),
            "https://test.local/pune/r/reviews?page=2"
        );
        assert_eq!(
            convert_to_absolute_url("?page=3", "https://test.local/pune/r/reviews?page=2").unwrap(),
            "https://test.local/pune/r/reviews?page=3"
        );
    }

    #[test]
    fn test_normalize_url_for_cli() {
        assert_eq!(normalize_url_for_cli("test.local/"), "https://test.local");
        assert_eq!(normalize_url_for_cli("http://test.local"), "http://test.local");
    }
}
