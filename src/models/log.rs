use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A diary entry joined with its cached movie, so list views never need a
/// second lookup for the title or artwork paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_id: i64,
    pub movie_id: i64,
    /// Personal rating, 1-5 with half steps.
    pub user_rating: f64,
    pub watched_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Joined movie fields
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i32>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub overview: Option<String>,
    pub runtime: Option<i32>,
    pub genres: Option<String>,
    pub director: Option<String>,
    pub tmdb_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    WatchedDate,
    Rating,
    Title,
}

impl SortField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortField::WatchedDate => "l.watched_date",
            SortField::Rating => "l.user_rating",
            SortField::Title => "m.title",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Filtering and ordering for log listings.
///
/// Sorting is restricted to the enum variants above; caller input never
/// reaches the ORDER BY clause as text.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Restrict to entries watched in this calendar year.
    pub year: Option<i32>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}
