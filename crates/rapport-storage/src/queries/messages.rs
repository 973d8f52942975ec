// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence and the at-most-once processing claim.

use rapport_core::RapportError;
use rapport_core::types::Message;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, parse_ts, ts};

const COLUMNS: &str = "id, conversation_id, sender_id, content, processed, created_at";

pub(crate) fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let created_at: String = row.get(5)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        processed: row.get(4)?,
        created_at: parse_ts(5, &created_at)?,
    })
}

pub(crate) fn insert_on(conn: &rusqlite::Connection, message: &Message) -> rusqlite::Result<()> {
    conn.execute(
        &format!("INSERT INTO messages ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            message.id,
            message.conversation_id,
            message.sender_id,
            message.content,
            message.processed,
            ts(&message.created_at),
        ],
    )?;
    Ok(())
}

pub async fn insert(db: &Database, message: &Message) -> Result<(), RapportError> {
    let message = message.clone();
    db.connection()
        .call(move |conn| insert_on(conn, &message))
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<Message>, RapportError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
                params![id],
                row_to_message,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// The last `limit` messages, returned oldest first.
pub async fn recent(
    db: &Database,
    conversation_id: &str,
    limit: usize,
) -> Result<Vec<Message>, RapportError> {
    let conversation_id = conversation_id.to_string();
    let limit = limit as i64;
    let mut messages = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;
    messages.reverse();
    Ok(messages)
}

/// Flips `processed` from 0 to 1. Returns false if someone already did.
pub async fn claim(db: &Database, id: &str) -> Result<bool, RapportError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET processed = 1 WHERE id = ?1 AND processed = 0",
                params![id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Unprocessed messages from counterparts, oldest first.
pub async fn unprocessed_inbound(db: &Database, limit: usize) -> Result<Vec<Message>, RapportError> {
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, m.content, m.processed, m.created_at
                 FROM messages m
                 JOIN conversations c ON c.id = m.conversation_id
                 WHERE m.processed = 0 AND m.sender_id <> c.agent_id
                 ORDER BY m.created_at ASC, m.rowid ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
