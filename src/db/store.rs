use std::path::Path;

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};

use super::schema::{MIGRATIONS, SCHEMA_VERSION};

const PRAGMAS: &str = "PRAGMA foreign_keys = ON;
 PRAGMA journal_mode = WAL;
 PRAGMA synchronous = NORMAL;
 PRAGMA busy_timeout = 5000;";

/// Handle to the diary's SQLite store.
///
/// `open` returns only after the schema is current, so repositories built
/// from a handle never observe a missing table. All clones share one
/// long-lived connection worker; SQLite serializes the writes.
#[derive(Clone)]
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    /// Opens (creating if needed) the store at `path` and brings its
    /// schema up to the current version.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let fresh = !path.exists();
        let conn = Connection::open(path)
            .await
            .map_err(|e| AppError::Initialization(e.to_string()))?;
        let db = Self { conn };
        db.initialize(fresh).await?;
        Ok(db)
    }

    /// In-memory store for tests; always starts fresh.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| AppError::Initialization(e.to_string()))?;
        let db = Self { conn };
        db.initialize(true).await?;
        Ok(db)
    }

    pub(crate) fn connection(&self) -> Connection {
        self.conn.clone()
    }

    /// Version recorded in `app_metadata`; 0 when the table or key does
    /// not exist yet.
    pub async fn schema_version(&self) -> Result<i64> {
        let value: Option<String> = self
            .conn
            .call(|conn| {
                let table_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'app_metadata'",
                    [],
                    |row| row.get(0),
                )?;
                if table_count == 0 {
                    return Ok(None);
                }
                let value = conn
                    .query_row(
                        "SELECT value FROM app_metadata WHERE key = 'schema_version'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(value)
            })
            .await?;

        match value {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Initialization(format!("unreadable schema version: {raw}"))),
            None => Ok(0),
        }
    }

    async fn initialize(&self, fresh: bool) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(PRAGMAS)?;
                Ok(())
            })
            .await
            .map_err(|e| AppError::Initialization(e.to_string()))?;

        let from = if fresh {
            0
        } else {
            match self.schema_version().await {
                Ok(version) => version,
                Err(AppError::Initialization(msg)) => return Err(AppError::Initialization(msg)),
                Err(err) => return Err(AppError::Initialization(err.to_string())),
            }
        };

        if from > SCHEMA_VERSION {
            return Err(AppError::Initialization(format!(
                "store is at schema version {from}, newer than supported {SCHEMA_VERSION}"
            )));
        }
        if from == SCHEMA_VERSION {
            return Ok(());
        }

        if fresh {
            // New store: the whole current schema in one batch, no replay
            // of intermediate versions.
            tracing::info!(version = SCHEMA_VERSION, "creating database schema");
            self.conn
                .call(|conn| {
                    for step in MIGRATIONS {
                        conn.execute_batch(step)?;
                    }
                    set_version(conn, SCHEMA_VERSION)?;
                    Ok(())
                })
                .await
                .map_err(|e| AppError::Initialization(format!("schema creation failed: {e}")))?;
        } else {
            tracing::info!(from, to = SCHEMA_VERSION, "migrating database schema");
            for version in from..SCHEMA_VERSION {
                let step = MIGRATIONS[version as usize];
                self.conn
                    .call(move |conn| {
                        conn.execute_batch(step)?;
                        set_version(conn, version + 1)?;
                        Ok(())
                    })
                    .await
                    .map_err(|e| {
                        AppError::Initialization(format!(
                            "migration to version {} failed: {e}",
                            version + 1
                        ))
                    })?;
            }
        }
        Ok(())
    }
}

fn set_version(conn: &rusqlite::Connection, version: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO app_metadata (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}
