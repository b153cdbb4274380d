/// Version the store is at after every step in [`MIGRATIONS`] has run.
pub const SCHEMA_VERSION: i64 = 2;

/// Ordered migration steps; `MIGRATIONS[n]` brings a version-n store to
/// version n+1. Every statement is idempotent so an interrupted migration
/// can be retried from the last recorded version.
pub const MIGRATIONS: &[&str] = &[
    // v1: movie metadata cache
    r#"
-- movies table: full snapshots of catalog metadata, keyed by catalog id
CREATE TABLE IF NOT EXISTS movies (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    original_title TEXT,
    year INTEGER,
    poster_path TEXT,
    backdrop_path TEXT,
    overview TEXT,
    runtime INTEGER,
    genres TEXT,
    director TEXT,
    tmdb_rating REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- app_metadata table: key/value facts, currently only 'schema_version'
CREATE TABLE IF NOT EXISTS app_metadata (
    key TEXT PRIMARY KEY,
    value TEXT
);
"#,
    // v2: diary log entries, at most one per movie
    r#"
CREATE TABLE IF NOT EXISTS movie_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    movie_id INTEGER NOT NULL UNIQUE REFERENCES movies(id) ON DELETE CASCADE,
    user_rating REAL NOT NULL CHECK (user_rating BETWEEN 1 AND 5),
    watched_date TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_movie_logs_movie_id ON movie_logs(movie_id);
CREATE INDEX IF NOT EXISTS idx_movie_logs_watched_date ON movie_logs(watched_date);
"#,
];
