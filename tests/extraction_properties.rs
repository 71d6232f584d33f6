mod common;

use common::{listing_page, stars, Review};
use review_scraper::*;
use std::collections::HashSet;

fn extract(html: &str) -> Vec<ReviewCandidate> {
    ExtractionPipeline::new().extract_page(html, 1).unwrap().reviews
}

#[test]
fn structured_rating_outranks_text_and_glyphs() {
    let rating = format!(
        r#"<span itemprop="ratingValue" content="4.5"></span><p>Rated 4 out of 5</p>{}"#,
        stars(4)
    );
    let page = listing_page(
        "Foo Kopa",
        "pune",
        "foo-kopa",
        1,
        1,
        &[Review::new("Asha", "Loved the ambience and the music").rating(&rating)],
    );

    let reviews = extract(&page);
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating, Rating::new(4.5));
    assert_eq!(reviews[0].strategy, RatingSource::Structured);
}

#[test]
fn glyphs_alone_give_glyph_rating() {
    let glyphs = stars(3);
    let page = listing_page(
        "Foo Kopa",
        "pune",
        "foo-kopa",
        1,
        1,
        &[Review::new("Ravi", "Decent biryani, a little oily").rating(&glyphs)],
    );

    let reviews = extract(&page);
    assert_eq!(reviews[0].rating, Rating::new(3.0));
    assert_eq!(reviews[0].strategy, RatingSource::Glyph);
}

#[test]
fn review_without_rating_signal_is_still_emitted() {
    let page = listing_page(
        "Foo Kopa",
        "pune",
        "foo-kopa",
        1,
        1,
        &[Review::new("Meera", "Came here for a birthday dinner")],
    );

    let reviews = extract(&page);
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].rating, None);
    assert_eq!(reviews[0].strategy, RatingSource::None);
    assert_eq!(reviews[0].reviewer.as_deref(), Some("Meera"));
    assert_eq!(reviews[0].text.as_deref(), Some("Came here for a birthday dinner"));
}

#[test]
fn extraction_is_deterministic() {
    let glyphs = stars(5);
    let page = listing_page(
        "Foo Kopa",
        "pune",
        "foo-kopa",
        1,
        2,
        &[
            Review::new("Asha", "Perfect evening, will return").rating(&glyphs),
            Review::new("Ravi", "Average food, 3 stars from me"),
            Review::new("John", "Quick delivery and hot food")
                .extra(r#"<span class="rating-type">DELIVERY</span>"#),
        ],
    );

    let pipeline = ExtractionPipeline::new();
    let first = pipeline.extract_page(&page, 1).unwrap();
    let second = pipeline.extract_page(&page, 1).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.reviews.len(), 3);
}

#[test]
fn ratings_stay_within_scale() {
    let noisy = [
        "<p>Rated 9 out of 10</p>",
        "<p>7 stars!!</p>",
        r#"<div class="score">42</div>"#,
        r#"<span itemprop="ratingValue" content="12"></span>"#,
        "<p>★★★★★★★</p>",
    ];
    let reviews: Vec<Review> = noisy
        .iter()
        .enumerate()
        .map(|(i, html)| Review::new(["A", "B", "C", "D", "E"][i], "Some honest words here").rating(html))
        .collect();
    let page = listing_page("Foo Kopa", "pune", "foo-kopa", 1, 1, &reviews);

    for review in extract(&page) {
        if let Some(rating) = review.rating {
            assert!((0.0..=5.0).contains(&rating.value()), "out of scale: {:?}", review);
        }
        assert!(review.validate().is_ok());
    }
}

#[test]
fn deduplicated_reviews_have_unique_keys() {
    let glyphs = stars(4);
    let page = listing_page(
        "Foo Kopa",
        "pune",
        "foo-kopa",
        1,
        1,
        &[
            Review::new("Asha", "Loved the ambience and the music").rating(&glyphs),
            Review::new("Asha", "Loved   the ambience and the MUSIC"),
            Review::new("Ravi", "Loved the ambience and the music"),
        ],
    );

    let pipeline = ExtractionPipeline::new();
    let mut candidates = pipeline.extract_page(&page, 1).unwrap().reviews;
    candidates.extend(pipeline.extract_page(&page, 2).unwrap().reviews);

    let deduped = Deduplicator::new().dedupe(candidates);
    let keys: HashSet<DedupKey> = deduped.iter().map(ReviewCandidate::dedup_key).collect();
    assert_eq!(keys.len(), deduped.len());
    assert_eq!(deduped.len(), 2);

    let asha = deduped.iter().find(|r| r.reviewer.as_deref() == Some("Asha")).unwrap();
    assert_eq!(asha.strategy, RatingSource::Glyph);
    assert_eq!(asha.page_index, 1);
}
