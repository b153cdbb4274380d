use serde::{Deserialize, Serialize};

/// A cached snapshot of one movie from the remote catalog.
///
/// `id` is the catalog's id, never generated locally. Re-caching a movie
/// replaces the whole snapshot; optional fields missing from the new
/// snapshot are stored as NULL rather than keeping stale values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    /// Runtime in minutes.
    pub runtime: Option<i32>,
    /// Comma-joined genre names, denormalized for display.
    pub genres: Option<String>,
    pub director: Option<String>,
    /// Catalog community rating, 0-10.
    pub tmdb_rating: Option<f64>,
}
