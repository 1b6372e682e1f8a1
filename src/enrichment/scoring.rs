//! Best-match scoring for search candidates.
//!
//! A movie candidate scores `0.7 * name_similarity + 0.3 * year_score`.
//! Both terms lie in `[0, 1]`, so the score does too.

use strsim::normalized_levenshtein;

use super::domain::MetadataRecord;

const NAME_WEIGHT: f64 = 0.7;
const YEAR_WEIGHT: f64 = 0.3;

/// Year score when either side has no year to compare.
const UNKNOWN_YEAR_SCORE: f64 = 0.5;

/// Lowercase, keep alphanumerics, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let mapped: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity ratio of two titles after normalization, in `[0, 1]`.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize_title(a), &normalize_title(b)).clamp(0.0, 1.0)
}

/// `max(0, 1 - 0.1 * |delta|)`; 0.5 when a year is missing.
pub fn year_score(wanted: Option<i32>, candidate: Option<i32>) -> f64 {
    match (wanted, candidate) {
        (Some(w), Some(c)) => (1.0 - 0.1 * f64::from((w - c).abs())).max(0.0),
        _ => UNKNOWN_YEAR_SCORE,
    }
}

/// Combined movie score.
pub fn movie_score(title: &str, wanted_year: Option<i32>, candidate: &MetadataRecord) -> f64 {
    let names = name_similarity(title, &candidate.title).max(
        candidate
            .original_title
            .as_deref()
            .map(|orig| name_similarity(title, orig))
            .unwrap_or(0.0),
    );
    NAME_WEIGHT * names + YEAR_WEIGHT * year_score(wanted_year, candidate.year())
}

/// Highest-scoring candidate. Ties keep the earlier candidate, which
/// preserves the provider's relevance order.
pub fn pick_best<T>(candidates: Vec<T>, score: impl Fn(&T) -> f64) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for candidate in candidates {
        let s = score(&candidate);
        match &best {
            Some((_, best_score)) if s <= *best_score => {}
            _ => best = Some((candidate, s)),
        }
    }
    best
}
