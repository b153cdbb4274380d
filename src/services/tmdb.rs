use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::Movie;

const TMDB_API_URL: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p/";

/// Poster size variant requested by default.
pub const POSTER_SIZE: &str = "w342";
/// Backdrop size variant requested by default.
pub const BACKDROP_SIZE: &str = "w780";

/// Client for the TMDB catalog: search, details and image URL resolution.
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("cinelog/0.1")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
        }
    }

    pub fn set_api_key(&mut self, api_key: impl Into<String>) {
        self.api_key = api_key.into();
    }

    fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(AppError::Validation("TMDB API key not set".to_string()));
        }
        Ok(&self.api_key)
    }

    /// One page of search results. Search rows carry no runtime, genres or
    /// director; those come from `movie_details`.
    pub async fn search_movies(&self, query: &str, page: u32) -> Result<SearchPage> {
        let api_key = self.require_api_key()?;

        let response = self
            .client
            .get(format!("{TMDB_API_URL}/search/movie"))
            .query(&[("api_key", api_key), ("query", query)])
            .query(&[("page", page)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Network(response.status()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(SearchPage {
            results: body.results.into_iter().map(SearchMovie::into_movie).collect(),
            page: body.page,
            total_pages: body.total_pages,
            total_results: body.total_results,
        })
    }

    /// Full metadata for one movie, with the director resolved from the
    /// credits endpoint. A failed credits lookup degrades to no director
    /// rather than failing the whole call.
    pub async fn movie_details(&self, movie_id: i64) -> Result<Movie> {
        let api_key = self.require_api_key()?;

        let response = self
            .client
            .get(format!("{TMDB_API_URL}/movie/{movie_id}"))
            .query(&[("api_key", api_key)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Network(response.status()));
        }
        let details: DetailsResponse = response.json().await?;

        let director = match self.director(movie_id).await {
            Ok(director) => director,
            Err(err) => {
                tracing::warn!(movie_id, error = %err, "director lookup failed");
                None
            }
        };

        Ok(details.into_movie(director))
    }

    async fn director(&self, movie_id: i64) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{TMDB_API_URL}/movie/{movie_id}/credits"))
            .query(&[("api_key", &self.api_key)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Network(response.status()));
        }
        let credits: CreditsResponse = response.json().await?;
        Ok(credits
            .crew
            .into_iter()
            .find(|member| member.job == "Director")
            .map(|member| member.name))
    }

    /// Resolves a catalog-relative poster path to a full image URL.
    /// None when the movie has no poster.
    pub fn poster_url(&self, poster_path: Option<&str>, size: &str) -> Option<Url> {
        image_url(poster_path, size)
    }

    /// Resolves a catalog-relative backdrop path to a full image URL.
    pub fn backdrop_url(&self, backdrop_path: Option<&str>, size: &str) -> Option<Url> {
        image_url(backdrop_path, size)
    }

    pub fn original_poster_url(&self, poster_path: Option<&str>) -> Option<Url> {
        image_url(poster_path, "original")
    }

    pub fn original_backdrop_url(&self, backdrop_path: Option<&str>) -> Option<Url> {
        image_url(backdrop_path, "original")
    }
}

fn image_url(path: Option<&str>, size: &str) -> Option<Url> {
    let path = path?;
    if path.is_empty() {
        return None;
    }
    Url::parse(&format!("{TMDB_IMAGE_URL}{size}{path}")).ok()
}

fn release_year(release_date: Option<&str>) -> Option<i32> {
    release_date?.split('-').next()?.parse().ok()
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub results: Vec<Movie>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchMovie>,
    page: u32,
    total_pages: u32,
    total_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchMovie {
    id: i64,
    title: String,
    original_title: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
}

impl SearchMovie {
    fn into_movie(self) -> Movie {
        Movie {
            id: self.id,
            title: self.title,
            original_title: self.original_title,
            year: release_year(self.release_date.as_deref()),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            overview: self.overview,
            runtime: None,
            genres: None,
            director: None,
            tmdb_rating: self.vote_average,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    id: i64,
    title: String,
    original_title: Option<String>,
    release_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    overview: Option<String>,
    runtime: Option<i32>,
    #[serde(default)]
    genres: Vec<Genre>,
    vote_average: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

impl DetailsResponse {
    fn into_movie(self, director: Option<String>) -> Movie {
        let genres = if self.genres.is_empty() {
            None
        } else {
            Some(
                self.genres
                    .into_iter()
                    .map(|genre| genre.name)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };
        Movie {
            id: self.id,
            title: self.title,
            original_title: self.original_title,
            year: release_year(self.release_date.as_deref()),
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            overview: self.overview,
            runtime: self.runtime,
            genres,
            director,
            tmdb_rating: self.vote_average,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: String,
    job: String,
}
