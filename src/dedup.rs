//! Review identity and cross-page deduplication.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::models::ReviewCandidate;

/// Identity of a review: the same reviewer, date and text is the same review
/// no matter which page or run it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub reviewer: String,
    pub date: String,
    /// SHA-256 (hex) of the normalized review text.
    pub text_hash: String,
}

impl DedupKey {
    pub fn for_candidate(candidate: &ReviewCandidate) -> Self {
        Self {
            reviewer: candidate
                .reviewer
                .as_deref()
                .map(normalize_reviewer)
                .unwrap_or_default(),
            date: candidate
                .date
                .as_ref()
                .map(|d| d.canonical())
                .unwrap_or_default(),
            text_hash: hash_text(candidate.text.as_deref().unwrap_or_default()),
        }
    }
}

fn normalize_reviewer(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Lowercase, punctuation stripped, whitespace collapsed.
pub fn normalize_text(text: &str) -> String {
    let stripped: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapses candidates sharing a [`DedupKey`].
///
/// When copies differ, the higher-confidence strategy wins; on a tie, the
/// copy with a rating wins; otherwise the first one seen is kept. Output
/// keeps first-seen order, so page order survives.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    pub fn dedupe(&self, candidates: Vec<ReviewCandidate>) -> Vec<ReviewCandidate> {
        let total = candidates.len();
        let mut slots: Vec<ReviewCandidate> = Vec::with_capacity(total);
        let mut positions: HashMap<DedupKey, usize> = HashMap::with_capacity(total);

        for candidate in candidates {
            let key = candidate.dedup_key();
            match positions.get(&key) {
                Some(&slot) => {
                    if Self::prefer(&candidate, &slots[slot]) {
                        tracing::trace!(
                            page_index = candidate.page_index,
                            strategy = candidate.strategy.as_str(),
                            "Duplicate review replaces earlier copy"
                        );
                        // The kept copy stays at the first-seen position and page.
                        let page_index = slots[slot].page_index;
                        slots[slot] = ReviewCandidate {
                            page_index,
                            ..candidate
                        };
                    }
                }
                None => {
                    positions.insert(key, slots.len());
                    slots.push(candidate);
                }
            }
        }

        if slots.len() < total {
            tracing::debug!(before = total, after = slots.len(), "Deduplicated reviews");
        }
        slots
    }

    /// True if `challenger` should replace `incumbent`.
    fn prefer(challenger: &ReviewCandidate, incumbent: &ReviewCandidate) -> bool {
        match challenger.confidence().cmp(&incumbent.confidence()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => challenger.rating.is_some() && incumbent.rating.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Rating, RatingSource, ReviewDate};
    use std::collections::HashSet;

    fn review(reviewer: &str, text: &str, rating: Option<f64>, strategy: RatingSource, page: u32) -> ReviewCandidate {
        ReviewCandidate {
            reviewer: Some(reviewer.to_string()),
            rating: rating.and_then(Rating::new),
            text: Some(text.to_string()),
            date: Some(ReviewDate::Raw {
                text: "Jan 2023".to_string(),
            }),
            channel: Channel::Unknown,
            page_index: page,
            strategy,
        }
    }

    #[test]
    fn test_key_ignores_case_whitespace_and_punctuation() {
        let a = review("Asha  K", "Great food!! Loved it.", None, RatingSource::None, 1);
        let b = review("asha k", "great food loved   it", None, RatingSource::None, 2);
        assert_eq!(a.dedup_key(), b.dedup_key());

        let c = review("asha k", "great food, hated it", None, RatingSource::None, 2);
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_higher_confidence_wins() {
        let dedup = Deduplicator::new();
        let out = dedup.dedupe(vec![
            review("Asha", "Nice", Some(3.0), RatingSource::Glyph, 1),
            review("Asha", "Nice", Some(4.0), RatingSource::Structured, 2),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].strategy, RatingSource::Structured);
        assert_eq!(out[0].rating, Rating::new(4.0));
        assert_eq!(out[0].page_index, 1);
    }

    #[test]
    fn test_rated_copy_wins_on_equal_confidence() {
        let dedup = Deduplicator::new();
        let unrated = review("Asha", "Nice", None, RatingSource::None, 1);
        let rated = review("Asha", "Nice", Some(2.0), RatingSource::None, 2);
        // Only reachable by hand-built records; extraction never emits this pair.
        let out = dedup.dedupe(vec![unrated, rated]);
        assert_eq!(out[0].rating, Rating::new(2.0));
    }

    #[test]
    fn test_first_seen_kept_on_full_tie_and_order_preserved() {
        let dedup = Deduplicator::new();
        let out = dedup.dedupe(vec![
            review("Asha", "One", Some(4.0), RatingSource::Text, 1),
            review("Ravi", "Two", Some(2.0), RatingSource::Text, 1),
            review("Asha", "One", Some(5.0), RatingSource::Text, 2),
            review("Meera", "Three", None, RatingSource::None, 2),
        ]);
        let names: Vec<_> = out.iter().map(|r| r.reviewer.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["Asha", "Ravi", "Meera"]);
        assert_eq!(out[0].rating, Rating::new(4.0));
    }

    #[test]
    fn test_output_keys_unique() {
        let dedup = Deduplicator::new();
        let mut input = Vec::new();
        for page in 1..=4 {
            for (i, name) in ["A", "B", "C", "a", "b "].iter().enumerate() {
                let strategy = if i % 2 == 0 { RatingSource::Glyph } else { RatingSource::None };
                let rating = (i % 2 == 0).then_some(3.0);
                input.push(review(name, "same words", rating, strategy, page));
            }
        }
        let out = dedup.dedupe(input);
        let keys: HashSet<_> = out.iter().map(|r| r.dedup_key()).collect();
        assert_eq!(keys.len(), out.len());
        assert_eq!(out.len(), 3);
    }
}
