//! TMDB API Data Transfer Objects
//!
//! These types match what the TMDB v3 API returns for the endpoints we use.
//! DO NOT use these types outside the tmdb module - convert to domain types.
//!
//! API Reference: https://developer.themoviedb.org/reference
//!
//! Most fields are optional in practice (unreleased titles have no date,
//! new shows have no networks), so nearly everything is `Option` or
//! defaulted.

use serde::{Deserialize, Serialize};

/// Paged search envelope (`/search/movie`, `/search/multi`, `/search/tv`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    pub total_results: Option<u64>,
}

/// Hit from `/search/movie`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovieResult {
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub release_date: Option<String>,
    pub popularity: Option<f64>,
}

/// Hit from `/search/multi`; movies carry `title`, shows carry `name`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MultiResult {
    pub id: i64,
    pub media_type: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// Production company or network
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Country {
    pub iso_3166_1: String,
    pub name: String,
}

/// `/movie/{id}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MovieDetails {
    pub id: i64,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub release_date: Option<String>,
    pub original_language: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub production_companies: Vec<Company>,
    #[serde(default)]
    pub production_countries: Vec<Country>,
    pub status: Option<String>,
    pub runtime: Option<u32>,
}

/// `/tv/{id}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TvDetails {
    pub id: i64,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub popularity: Option<f64>,
    pub first_air_date: Option<String>,
    pub original_language: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub networks: Vec<Company>,
    #[serde(default)]
    pub origin_country: Vec<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
}

/// `/tv/{id}/season/{n}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeasonDetails {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    pub season_number: u32,
    #[serde(default)]
    pub episodes: Vec<EpisodeDetails>,
}

/// `/tv/{id}/season/{n}/episode/{e}`, also embedded in seasons
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EpisodeDetails {
    pub id: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub still_path: Option<String>,
    pub air_date: Option<String>,
    pub season_number: u32,
    pub episode_number: u32,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u64>,
    pub runtime: Option<u32>,
}

/// Error body, e.g. `{"status_code": 7, "status_message": "Invalid API key"}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub status_code: Option<i64>,
    pub status_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_movie_search() {
        let json = r#"{
            "page": 1,
            "results": [
                {"id": 550, "title": "Fight Club", "original_title": "Fight Club",
                 "release_date": "1999-10-15", "popularity": 61.4, "adult": false}
            ],
            "total_results": 1
        }"#;
        let parsed: SearchResponse<MovieResult> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].id, 550);
        assert_eq!(parsed.results[0].release_date.as_deref(), Some("1999-10-15"));
    }

    #[test]
    fn test_parse_multi_search_mixed() {
        let json = r#"{"results": [
            {"id": 1, "media_type": "person", "name": "Someone"},
            {"id": 1399, "media_type": "tv", "name": "Game of Thrones", "first_air_date": "2011-04-17"},
            {"id": 2, "media_type": "movie", "title": "A Film"}
        ]}"#;
        let parsed: SearchResponse<MultiResult> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results[1].media_type.as_deref(), Some("tv"));
        assert_eq!(parsed.results[1].name.as_deref(), Some("Game of Thrones"));
        assert_eq!(parsed.total_results, None);
    }

    #[test]
    fn test_parse_season_with_episodes() {
        let json = r#"{
            "id": 3624, "name": "Season 1", "air_date": "2011-04-17", "season_number": 1,
            "poster_path": "/s1.jpg",
            "episodes": [
                {"id": 63056, "name": "Winter Is Coming", "season_number": 1, "episode_number": 1,
                 "air_date": "2011-04-17", "still_path": "/e1.jpg", "vote_average": 7.9, "vote_count": 300}
            ]
        }"#;
        let parsed: SeasonDetails = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.episodes.len(), 1);
        assert_eq!(parsed.episodes[0].episode_number, 1);
    }

    #[test]
    fn test_parse_movie_details_minimal() {
        let parsed: MovieDetails = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert!(parsed.genres.is_empty());
        assert!(parsed.release_date.is_none());
    }
}
