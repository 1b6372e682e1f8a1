//! Quality thresholds applied to resolved metadata.

use crate::config::FilterConfig;
use crate::enrichment::MetadataRecord;

/// Minimums a record must meet to be materialized. Unset limits pass, and
/// nothing is checked unless `enabled`.
#[derive(Debug, Clone, Default)]
pub struct QualityThresholds {
    pub enabled: bool,
    pub min_year: Option<i32>,
    pub min_rating: Option<f64>,
    pub min_votes: Option<u64>,
    pub min_popularity: Option<f64>,
    pub languages: Vec<String>,
}

impl From<&FilterConfig> for QualityThresholds {
    fn from(config: &FilterConfig) -> Self {
        Self {
            enabled: config.enabled,
            min_year: config.min_year,
            min_rating: config.min_rating,
            min_votes: config.min_votes,
            min_popularity: config.min_popularity,
            languages: config
                .languages
                .iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }
}

impl QualityThresholds {
    /// Every threshold `record` misses, as human-readable reasons.
    /// Empty means it passes.
    pub fn failures(&self, record: &MetadataRecord) -> Vec<String> {
        let mut reasons = Vec::new();
        if !self.enabled {
            return reasons;
        }

        if let Some(min) = self.min_rating
            && record.vote_average < min
        {
            reasons.push(format!("rating {:.1} < {:.1}", record.vote_average, min));
        }
        if let Some(min) = self.min_votes
            && record.vote_count < min
        {
            reasons.push(format!("votes {} < {}", record.vote_count, min));
        }
        if let Some(min) = self.min_popularity
            && record.popularity < min
        {
            reasons.push(format!("popularity {:.1} < {:.1}", record.popularity, min));
        }
        // An unknown year can't be shown to be too old.
        if let (Some(min), Some(year)) = (self.min_year, record.year())
            && year < min
        {
            reasons.push(format!("year {year} < {min}"));
        }
        if !self.languages.is_empty()
            && let Some(lang) = record.original_language.as_deref()
            && !self.languages.iter().any(|l| l.eq_ignore_ascii_case(lang))
        {
            reasons.push(format!("language '{lang}' not allowed"));
        }

        reasons
    }
}
