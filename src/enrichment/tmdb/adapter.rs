//! Adapter layer: Convert TMDB DTOs to domain models
//!
//! This is the ONLY place where TMDB DTO types are converted to domain types.

use super::dto;
use crate::enrichment::domain::{MetadataRecord, RecordKind, SearchHit};

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

pub fn movie_hit(result: dto::MovieResult) -> SearchHit {
    SearchHit {
        id: result.id,
        title: result.title.or(result.original_title).unwrap_or_default(),
        media_type: Some("movie".to_string()),
        release_date: non_empty(result.release_date),
        popularity: result.popularity.unwrap_or_default(),
    }
}

pub fn multi_hit(result: dto::MultiResult) -> SearchHit {
    SearchHit {
        id: result.id,
        title: result.name.or(result.title).unwrap_or_default(),
        media_type: result.media_type,
        release_date: non_empty(result.first_air_date.or(result.release_date)),
        popularity: result.popularity.unwrap_or_default(),
    }
}

pub fn movie_record(details: dto::MovieDetails, raw: serde_json::Value) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Movie,
        id: details.id,
        title: details
            .title
            .clone()
            .or_else(|| details.original_title.clone())
            .unwrap_or_default(),
        original_title: details.original_title,
        overview: details.overview.unwrap_or_default(),
        poster_path: non_empty(details.poster_path),
        backdrop_path: non_empty(details.backdrop_path),
        still_path: None,
        vote_average: details.vote_average.unwrap_or_default(),
        vote_count: details.vote_count.unwrap_or_default(),
        popularity: details.popularity.unwrap_or_default(),
        release_date: non_empty(details.release_date),
        original_language: non_empty(details.original_language),
        genres: details.genres.into_iter().map(|g| g.name).collect(),
        studios: details
            .production_companies
            .into_iter()
            .map(|c| c.name)
            .collect(),
        countries: details
            .production_countries
            .into_iter()
            .map(|c| c.name)
            .collect(),
        status: details.status,
        runtime: details.runtime.filter(|r| *r > 0),
        season_number: None,
        episode_number: None,
        episodes: Vec::new(),
        raw,
    }
}

pub fn show_record(details: dto::TvDetails, raw: serde_json::Value) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Show,
        id: details.id,
        title: details
            .name
            .clone()
            .or_else(|| details.original_name.clone())
            .unwrap_or_default(),
        original_title: details.original_name,
        overview: details.overview.unwrap_or_default(),
        poster_path: non_empty(details.poster_path),
        backdrop_path: non_empty(details.backdrop_path),
        still_path: None,
        vote_average: details.vote_average.unwrap_or_default(),
        vote_count: details.vote_count.unwrap_or_default(),
        popularity: details.popularity.unwrap_or_default(),
        release_date: non_empty(details.first_air_date),
        original_language: non_empty(details.original_language),
        genres: details.genres.into_iter().map(|g| g.name).collect(),
        studios: details.networks.into_iter().map(|n| n.name).collect(),
        countries: details.origin_country,
        status: details.status,
        runtime: details.episode_run_time.first().copied(),
        season_number: None,
        episode_number: None,
        episodes: Vec::new(),
        raw,
    }
}

pub fn episode_record(details: dto::EpisodeDetails, raw: serde_json::Value) -> MetadataRecord {
    MetadataRecord {
        kind: RecordKind::Episode,
        id: details.id,
        title: details.name.unwrap_or_default(),
        overview: details.overview.unwrap_or_default(),
        still_path: non_empty(details.still_path),
        vote_average: details.vote_average.unwrap_or_default(),
        vote_count: details.vote_count.unwrap_or_default(),
        release_date: non_empty(details.air_date),
        runtime: details.runtime,
        season_number: Some(details.season_number),
        episode_number: Some(details.episode_number),
        raw,
        ..Default::default()
    }
}

pub fn season_record(details: dto::SeasonDetails, raw: serde_json::Value) -> MetadataRecord {
    let episode_raws = raw
        .get("episodes")
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default();

    let episodes = details
        .episodes
        .into_iter()
        .enumerate()
        .map(|(i, ep)| {
            let ep_raw = episode_raws.get(i).cloned().unwrap_or_default();
            episode_record(ep, ep_raw)
        })
        .collect();

    MetadataRecord {
        kind: RecordKind::Season,
        id: details.id.unwrap_or_default(),
        title: details
            .name
            .unwrap_or_else(|| format!("Season {}", details.season_number)),
        overview: details.overview.unwrap_or_default(),
        poster_path: non_empty(details.poster_path),
        release_date: non_empty(details.air_date),
        season_number: Some(details.season_number),
        episodes,
        raw,
        ..Default::default()
    }
}
