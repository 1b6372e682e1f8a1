//! TMDB (The Movie Database) integration
//!
//! Search and detail lookups for movies and TV, plus artwork downloads.
//!
//! API docs: https://developer.themoviedb.org/reference

pub mod dto;
mod adapter;
mod client;

pub use client::TmdbClient;
