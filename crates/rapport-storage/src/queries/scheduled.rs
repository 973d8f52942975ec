// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delayed delivery queue.
//!
//! Entries only leave `pending` through a conditional update, so concurrent
//! sweeps cannot deliver or fail the same entry twice.

use chrono::{DateTime, Utc};
use rapport_core::RapportError;
use rapport_core::types::{
    DeliveryOutcome, Message, NewScheduledMessage, PostSendEffect, ScheduleStatus,
    ScheduledMessage,
};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, json_err, map_tr_err, parse_ts, ts};
use crate::queries::contexts;
use crate::queries::messages::insert_on;

const COLUMNS: &str = "id, conversation_id, sender_id, content, scheduled_at, status, \
                       sent_at, effects, last_error, created_at";

fn row_to_scheduled(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    let scheduled_at: String = row.get(4)?;
    let status: String = row.get(5)?;
    let sent_at: Option<String> = row.get(6)?;
    let effects: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    Ok(ScheduledMessage {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        scheduled_at: parse_ts(4, &scheduled_at)?,
        status: status.parse::<ScheduleStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        sent_at: sent_at.as_deref().map(|s| parse_ts(6, s)).transpose()?,
        effects: serde_json::from_str(&effects).map_err(|e| json_err(7, e))?,
        last_error: row.get(8)?,
        created_at: parse_ts(9, &created_at)?,
    })
}

pub(crate) fn enqueue_on(
    conn: &rusqlite::Connection,
    entry: &NewScheduledMessage,
) -> rusqlite::Result<i64> {
    let effects = serde_json::to_string(&entry.effects).map_err(|e| {
        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
    })?;
    conn.execute(
        "INSERT INTO scheduled_messages
             (conversation_id, sender_id, content, scheduled_at, status, effects, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
        params![
            entry.conversation_id,
            entry.sender_id,
            entry.content,
            ts(&entry.scheduled_at),
            effects,
            ts(&Utc::now()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Persists a pending entry. Returns its id.
pub async fn enqueue(db: &Database, entry: &NewScheduledMessage) -> Result<i64, RapportError> {
    let entry = entry.clone();
    db.connection()
        .call(move |conn| enqueue_on(conn, &entry))
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<ScheduledMessage>, RapportError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM scheduled_messages WHERE id = ?1"),
                params![id],
                row_to_scheduled,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Every entry of a conversation in schedule order, whatever its status.
pub async fn list_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<ScheduledMessage>, RapportError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_messages
                 WHERE conversation_id = ?1
                 ORDER BY scheduled_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![conversation_id], row_to_scheduled)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Pending entries due at `now`, earliest first.
pub async fn due(
    db: &Database,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<ScheduledMessage>, RapportError> {
    let now = ts(&now);
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM scheduled_messages
                 WHERE status = 'pending' AND scheduled_at <= ?1
                 ORDER BY scheduled_at ASC, id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![now, limit], row_to_scheduled)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Marks the entry sent, inserts `message`, and applies the entry's
/// post-send effects, all in one transaction.
pub async fn deliver(
    db: &Database,
    id: i64,
    message: &Message,
) -> Result<DeliveryOutcome, RapportError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE scheduled_messages SET status = 'sent', sent_at = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, ts(&message.created_at)],
            )?;
            if changed == 0 {
                return Ok(DeliveryOutcome::AlreadyHandled);
            }

            let effects: String = tx.query_row(
                "SELECT effects FROM scheduled_messages WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let effects: Vec<PostSendEffect> =
                serde_json::from_str(&effects).map_err(|e| json_err(0, e))?;

            insert_on(&tx, &message)?;
            for effect in &effects {
                match effect {
                    PostSendEffect::AppendTranscript { line } => {
                        let applied = contexts::append_transcript_on(
                            &tx,
                            &message.conversation_id,
                            line,
                            &message.created_at,
                        )?;
                        if !applied {
                            tracing::debug!(
                                scheduled_id = id,
                                conversation_id = %message.conversation_id,
                                "no context yet, transcript append skipped"
                            );
                        }
                    }
                }
            }

            tx.commit()?;
            Ok(DeliveryOutcome::Sent)
        })
        .await
        .map_err(map_tr_err)
}

/// Marks the entry failed with `error`. Returns false if it was not pending.
pub async fn fail(db: &Database, id: i64, error: &str) -> Result<bool, RapportError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE scheduled_messages SET status = 'failed', last_error = ?2
                 WHERE id = ?1 AND status = 'pending'",
                params![id, error],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
