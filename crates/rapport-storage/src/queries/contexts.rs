// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relationship contexts with optimistic concurrency, and the atomic
//! termination write.

use chrono::{DateTime, Utc};
use rapport_core::RapportError;
use rapport_core::types::{ConversationContext, TerminationRecord};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, parse_ts, ts};
use crate::queries::scheduled::enqueue_on;

fn row_to_context(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationContext> {
    let updated_at: String = row.get(7)?;
    Ok(ConversationContext {
        conversation_id: row.get(0)?,
        summary: row.get(1)?,
        transcript: row.get(2)?,
        threshold: row.get(3)?,
        negative_streak: row.get(4)?,
        reengagement_attempts: row.get(5)?,
        version: row.get(6)?,
        updated_at: parse_ts(7, &updated_at)?,
    })
}

/// Conditional write. `expected_version == 0` inserts; otherwise the row is
/// updated only if its version still matches. Returns false on conflict.
fn save_on(
    conn: &rusqlite::Connection,
    context: &ConversationContext,
    expected_version: i64,
) -> rusqlite::Result<bool> {
    let now = ts(&Utc::now());
    let changed = if expected_version == 0 {
        conn.execute(
            "INSERT INTO conversation_contexts
                 (conversation_id, summary, transcript, threshold, negative_streak,
                  reengagement_attempts, version, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)
             ON CONFLICT(conversation_id) DO NOTHING",
            params![
                context.conversation_id,
                context.summary,
                context.transcript,
                context.threshold,
                context.negative_streak,
                context.reengagement_attempts,
                now,
            ],
        )?
    } else {
        conn.execute(
            "UPDATE conversation_contexts
             SET summary = ?2, transcript = ?3, threshold = ?4, negative_streak = ?5,
                 reengagement_attempts = ?6, version = ?7 + 1, updated_at = ?8
             WHERE conversation_id = ?1 AND version = ?7",
            params![
                context.conversation_id,
                context.summary,
                context.transcript,
                context.threshold,
                context.negative_streak,
                context.reengagement_attempts,
                expected_version,
                now,
            ],
        )?
    };
    Ok(changed == 1)
}

/// Appends one line to an existing context's transcript and bumps its
/// version. Returns false if the conversation has no context yet.
pub(crate) fn append_transcript_on(
    conn: &rusqlite::Connection,
    conversation_id: &str,
    line: &str,
    at: &DateTime<Utc>,
) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE conversation_contexts
         SET transcript = CASE WHEN transcript = '' THEN ?2 ELSE transcript || char(10) || ?2 END,
             version = version + 1,
             updated_at = ?3
         WHERE conversation_id = ?1",
        params![conversation_id, line, ts(at)],
    )?;
    Ok(changed == 1)
}

pub async fn get(
    db: &Database,
    conversation_id: &str,
) -> Result<Option<ConversationContext>, RapportError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT conversation_id, summary, transcript, threshold, negative_streak,
                        reengagement_attempts, version, updated_at
                 FROM conversation_contexts WHERE conversation_id = ?1",
                params![conversation_id],
                row_to_context,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save(
    db: &Database,
    context: &ConversationContext,
    expected_version: i64,
) -> Result<bool, RapportError> {
    let context = context.clone();
    db.connection()
        .call(move |conn| save_on(conn, &context, expected_version))
        .await
        .map_err(map_tr_err)
}

/// Context write, block, and farewell enqueue in one transaction.
///
/// Returns the farewell's scheduled id, or `None` (with nothing written) if
/// the context moved on or the block already exists.
pub async fn terminate(
    db: &Database,
    record: &TerminationRecord,
) -> Result<Option<i64>, RapportError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if !save_on(&tx, &record.context, record.expected_version)? {
                return Ok(None);
            }
            let blocked = tx.execute(
                "INSERT INTO blocks (blocker_id, blocked_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(blocker_id, blocked_id) DO NOTHING",
                params![record.blocker_id, record.blocked_id, ts(&Utc::now())],
            )?;
            if blocked == 0 {
                return Ok(None);
            }
            let id = enqueue_on(&tx, &record.farewell)?;
            tx.commit()?;
            Ok(Some(id))
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{conversation, setup_db};
    use crate::queries::{blocks, scheduled};
    use rapport_core::types::NewScheduledMessage;

    #[tokio::test]
    async fn insert_then_versioned_updates() {
        let (db, _dir) = setup_db().await;
        let conv = conversation(&db, "agent", "user").await;
        let mut ctx = ConversationContext::new(&conv.id, 0.5);

        assert!(save(&db, &ctx, 0).await.unwrap());
        assert!(!save(&db, &ctx, 0).await.unwrap(), "second insert conflicts");

        let stored = get(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        ctx.threshold = 0.4;
        assert!(save(&db, &ctx, 1).await.unwrap());
        assert!(!save(&db, &ctx, 1).await.unwrap(), "stale version conflicts");

        let stored = get(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.threshold, 0.4);
    }

    #[tokio::test]
    async fn threshold_out_of_range_is_rejected() {
        let (db, _dir) = setup_db().await;
        let conv = conversation(&db, "agent", "user").await;
        let ctx = ConversationContext::new(&conv.id, 1.5);
        assert!(save(&db, &ctx, 0).await.is_err());
    }

    fn termination(conv_id: &str, context: ConversationContext, expected: i64) -> TerminationRecord {
        TerminationRecord {
            farewell: NewScheduledMessage {
                conversation_id: conv_id.to_string(),
                sender_id: "agent".into(),
                content: "Take care.".into(),
                scheduled_at: Utc::now(),
                effects: vec![],
            },
            blocker_id: "agent".into(),
            blocked_id: "user".into(),
            context,
            expected_version: expected,
        }
    }

    #[tokio::test]
    async fn terminate_writes_everything_once() {
        let (db, _dir) = setup_db().await;
        let conv = conversation(&db, "agent", "user").await;
        let mut ctx = ConversationContext::new(&conv.id, 0.95);
        save(&db, &ctx, 0).await.unwrap();

        ctx.threshold = 1.0;
        let first = terminate(&db, &termination(&conv.id, ctx.clone(), 1)).await.unwrap();
        assert!(first.is_some());
        assert!(blocks::is_blocked(&db, "agent", "user").await.unwrap());

        // Same read version again: the context moved on, nothing is written.
        let second = terminate(&db, &termination(&conv.id, ctx, 1)).await.unwrap();
        assert!(second.is_none());
        assert_eq!(scheduled::list_for_conversation(&db, &conv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn terminate_rolls_back_when_already_blocked() {
        let (db, _dir) = setup_db().await;
        let conv = conversation(&db, "agent", "user").await;
        let ctx = ConversationContext::new(&conv.id, 0.95);
        save(&db, &ctx, 0).await.unwrap();
        blocks::record(&db, "agent", "user").await.unwrap();

        let mut next = ctx.clone();
        next.threshold = 1.0;
        assert!(terminate(&db, &termination(&conv.id, next, 1)).await.unwrap().is_none());

        let stored = get(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1, "context write rolled back");
        assert_eq!(stored.threshold, 0.95);
        assert!(scheduled::list_for_conversation(&db, &conv.id).await.unwrap().is_empty());
    }
}
