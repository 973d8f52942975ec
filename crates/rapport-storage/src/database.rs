// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle: PRAGMAs, migrations, and the single writer thread.
//!
//! Every statement runs on tokio-rusqlite's background thread. Do not open
//! additional connections for writes.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rapport_core::RapportError;
use tracing::debug;

use crate::migrations;

/// Handle to the Rapport SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path` in WAL mode.
    pub async fn open(path: &str) -> Result<Self, RapportError> {
        Self::open_with(path, true).await
    }

    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, RapportError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RapportError::Storage { source: Box::new(e) })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| RapportError::Storage { source: Box::new(e) })?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// A private in-memory database, mostly for tests.
    pub async fn open_in_memory() -> Result<Self, RapportError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| RapportError::Storage { source: Box::new(e) })?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), RapportError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA foreign_keys = ON;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| RapportError::Storage { source: Box::new(e) })
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), RapportError> {
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoints and closes the background connection.
    pub async fn close(self) -> Result<(), RapportError> {
        self.checkpoint().await?;
        self.conn
            .close()
            .await
            .map_err(|e| RapportError::Storage { source: Box::new(e) })
    }
}

pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> RapportError {
    RapportError::Storage { source: Box::new(e) }
}

/// RFC 3339 UTC with millisecond precision, so text order is time order.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn json_err(idx: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema_and_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("rapport.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        for expected in [
            "blocks",
            "conversation_contexts",
            "conversations",
            "matches",
            "messages",
            "profiles",
            "scheduled_messages",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn timestamps_round_trip_and_sort() {
        let a = DateTime::parse_from_rfc3339("2026-01-01T09:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ts(&a), "2026-01-01T09:00:00.500Z");
        assert!(ts(&a) < ts(&b));
        assert_eq!(parse_ts(0, &ts(&a)).unwrap(), a);
    }
}
