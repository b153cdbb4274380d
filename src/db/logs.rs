use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{LogEntry, LogQuery};

use super::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

const LOG_COLUMNS: &str = "l.id, l.movie_id, l.user_rating, l.watched_date, l.notes,
        l.created_at, l.updated_at,
        m.title, m.original_title, m.year, m.poster_path, m.backdrop_path,
        m.overview, m.runtime, m.genres, m.director, m.tmdb_rating";

/// The user's diary: one current log entry per cached movie.
#[derive(Clone)]
pub struct LogRepository {
    conn: Connection,
}

impl LogRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Creates or updates the diary entry for `movie_id`. Logging a movie
    /// again overwrites rating, date and notes while keeping the same
    /// entry id; a movie never has more than one current entry.
    ///
    /// The movie must already be cached; logging an uncached id fails with
    /// a validation error instead of a bare constraint violation.
    pub async fn log_movie(
        &self,
        movie_id: i64,
        rating: f64,
        watched_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<()> {
        let cached = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM movies WHERE id = ?1",
                    params![movie_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        if !cached {
            return Err(AppError::Validation(format!(
                "movie {movie_id} is not cached; cache it before logging"
            )));
        }

        let date = watched_date.format(DATE_FORMAT).to_string();
        let notes = notes.map(str::to_owned);
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO movie_logs (movie_id, user_rating, watched_date, notes)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(movie_id) DO UPDATE SET
                           user_rating = excluded.user_rating,
                           watched_date = excluded.watched_date,
                           notes = excluded.notes,
                           updated_at = datetime('now')"#,
                    params![movie_id, rating, date, notes],
                )?;
                Ok(())
            })
            .await?;
        tracing::debug!(movie_id, "logged movie");
        Ok(())
    }

    /// The entry for `movie_id` joined with its movie, or None if the
    /// movie is unlogged.
    pub async fn get_log_entry(&self, movie_id: i64) -> Result<Option<LogEntry>> {
        let entry = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {LOG_COLUMNS}
                     FROM movie_logs l
                     JOIN movies m ON m.id = l.movie_id
                     WHERE l.movie_id = ?1"
                ))?;
                let entry = stmt
                    .query_row(params![movie_id], log_entry_from_row)
                    .optional()?;
                Ok(entry)
            })
            .await?;
        Ok(entry)
    }

    /// All diary entries joined with their movies, narrowed and ordered
    /// per `query`.
    pub async fn get_movie_logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let year = query.year;
        let order_by = format!("{} {}", query.sort_by.column(), query.sort_order.keyword());
        let logs = self
            .conn
            .call(move |conn| {
                let base = format!(
                    "SELECT {LOG_COLUMNS}
                     FROM movie_logs l
                     JOIN movies m ON m.id = l.movie_id"
                );
                let logs = if let Some(year) = year {
                    let mut stmt = conn.prepare(&format!(
                        "{base} WHERE substr(l.watched_date, 1, 4) = ?1 ORDER BY {order_by}"
                    ))?;
                    stmt.query_map(params![format!("{year:04}")], log_entry_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                } else {
                    let mut stmt = conn.prepare(&format!("{base} ORDER BY {order_by}"))?;
                    stmt.query_map([], log_entry_from_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?
                };
                Ok(logs)
            })
            .await?;
        Ok(logs)
    }

    /// Rewrites rating, date and notes of the entry with this id.
    pub async fn update_log_entry(
        &self,
        log_id: i64,
        rating: f64,
        watched_date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<()> {
        let date = watched_date.format(DATE_FORMAT).to_string();
        let notes = notes.map(str::to_owned);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE movie_logs
                     SET user_rating = ?1, watched_date = ?2, notes = ?3,
                         updated_at = datetime('now')
                     WHERE id = ?4",
                    params![rating, date, notes, log_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Removes the entry with this id. The cached movie stays.
    pub async fn delete_log_entry(&self, log_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM movie_logs WHERE id = ?1", params![log_id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn is_movie_logged(&self, movie_id: i64) -> Result<bool> {
        let logged = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM movie_logs WHERE movie_id = ?1",
                    params![movie_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(logged)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format, e.g. "2026-01-11 12:34:56"
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn log_entry_from_row(row: &Row) -> rusqlite::Result<LogEntry> {
    let date_raw: String = row.get(3)?;
    let watched_date = NaiveDate::parse_from_str(&date_raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(LogEntry {
        log_id: row.get(0)?,
        movie_id: row.get(1)?,
        user_rating: row.get(2)?,
        watched_date,
        notes: row.get(4)?,
        created_at: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        updated_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        title: row.get(7)?,
        original_title: row.get(8)?,
        year: row.get(9)?,
        poster_path: row.get(10)?,
        backdrop_path: row.get(11)?,
        overview: row.get(12)?,
        runtime: row.get(13)?,
        genres: row.get(14)?,
        director: row.get(15)?,
        tmdb_rating: row.get(16)?,
    })
}
