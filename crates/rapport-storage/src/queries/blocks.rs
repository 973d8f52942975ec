// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directed block records.

use chrono::Utc;
use rapport_core::RapportError;
use rusqlite::params;

use crate::database::{Database, map_tr_err, ts};

/// Records "blocker blocks blocked". Returns false if it was already recorded.
pub async fn record(db: &Database, blocker_id: &str, blocked_id: &str) -> Result<bool, RapportError> {
    let blocker_id = blocker_id.to_string();
    let blocked_id = blocked_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO blocks (blocker_id, blocked_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(blocker_id, blocked_id) DO NOTHING",
                params![blocker_id, blocked_id, ts(&Utc::now())],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn is_blocked(
    db: &Database,
    blocker_id: &str,
    blocked_id: &str,
) -> Result<bool, RapportError> {
    let blocker_id = blocker_id.to_string();
    let blocked_id = blocked_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2)",
                params![blocker_id, blocked_id],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    #[tokio::test]
    async fn block_is_directed_and_recorded_once() {
        let (db, _dir) = setup_db().await;
        assert!(record(&db, "a", "b").await.unwrap());
        assert!(!record(&db, "a", "b").await.unwrap());
        assert!(is_blocked(&db, "a", "b").await.unwrap());
        assert!(!is_blocked(&db, "b", "a").await.unwrap());
    }
}
