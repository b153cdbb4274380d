use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::Movie;

use super::Database;

/// Read/write access to the local movie metadata cache.
#[derive(Clone)]
pub struct MovieRepository {
    conn: Connection,
}

impl MovieRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Stores a full snapshot of `movie`, replacing any previous snapshot
    /// with the same id.
    pub async fn cache_movie(&self, movie: &Movie) -> Result<()> {
        let id = movie.id;
        let movie = movie.clone();
        self.conn
            .call(move |conn| {
                // ON CONFLICT rather than INSERT OR REPLACE: REPLACE deletes
                // the old row first, and the cascade would take the movie's
                // log entry with it.
                conn.execute(
                    r#"INSERT INTO movies (
                           id, title, original_title, year, poster_path,
                           backdrop_path, overview, runtime, genres, director, tmdb_rating
                       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                       ON CONFLICT(id) DO UPDATE SET
                           title = excluded.title,
                           original_title = excluded.original_title,
                           year = excluded.year,
                           poster_path = excluded.poster_path,
                           backdrop_path = excluded.backdrop_path,
                           overview = excluded.overview,
                           runtime = excluded.runtime,
                           genres = excluded.genres,
                           director = excluded.director,
                           tmdb_rating = excluded.tmdb_rating"#,
                    params![
                        movie.id,
                        movie.title,
                        movie.original_title,
                        movie.year,
                        movie.poster_path,
                        movie.backdrop_path,
                        movie.overview,
                        movie.runtime,
                        movie.genres,
                        movie.director,
                        movie.tmdb_rating,
                    ],
                )?;
                Ok(())
            })
            .await?;
        tracing::debug!(id, "cached movie");
        Ok(())
    }

    /// Returns the cached snapshot, or None if the movie was never cached.
    pub async fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let movie = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, title, original_title, year, poster_path, backdrop_path,
                            overview, runtime, genres, director, tmdb_rating
                     FROM movies WHERE id = ?1",
                )?;
                let movie = stmt.query_row(params![id], movie_from_row).optional()?;
                Ok(movie)
            })
            .await?;
        Ok(movie)
    }
}

fn movie_from_row(row: &Row) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        title: row.get(1)?,
        original_title: row.get(2)?,
        year: row.get(3)?,
        poster_path: row.get(4)?,
        backdrop_path: row.get(5)?,
        overview: row.get(6)?,
        runtime: row.get(7)?,
        genres: row.get(8)?,
        director: row.get(9)?,
        tmdb_rating: row.get(10)?,
    })
}
