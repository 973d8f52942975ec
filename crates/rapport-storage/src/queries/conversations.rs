// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation lookup and creation, and the dormant-conversation scan.

use chrono::{DateTime, Utc};
use rapport_core::RapportError;
use rapport_core::types::{Conversation, DormantConversation};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err, parse_ts, ts};

const COLUMNS: &str = "id, agent_id, counterpart_id, created_at";

fn sorted_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let created_at: String = row.get(3)?;
    Ok(Conversation {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        counterpart_id: row.get(2)?,
        created_at: parse_ts(3, &created_at)?,
    })
}

/// Returns the conversation for the unordered pair, inserting it if absent.
///
/// When the pair already exists the stored agent/counterpart roles win.
pub async fn get_or_create(
    db: &Database,
    agent_id: &str,
    counterpart_id: &str,
) -> Result<Conversation, RapportError> {
    if agent_id == counterpart_id {
        return Err(RapportError::Invariant(format!(
            "conversation participants must differ, got {agent_id} twice"
        )));
    }
    let (low, high) = sorted_pair(agent_id, counterpart_id);
    let (low, high) = (low.to_string(), high.to_string());
    let agent_id = agent_id.to_string();
    let counterpart_id = counterpart_id.to_string();
    let id = uuid::Uuid::new_v4().to_string();
    let now = ts(&Utc::now());

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                     (id, agent_id, counterpart_id, pair_low, pair_high, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(pair_low, pair_high) DO NOTHING",
                params![id, agent_id, counterpart_id, low, high, now],
            )?;
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE pair_low = ?1 AND pair_high = ?2"),
                params![low, high],
                row_to_conversation,
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: &str) -> Result<Option<Conversation>, RapportError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                params![id],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Finds the conversation between two participants in either order.
pub async fn find(db: &Database, a: &str, b: &str) -> Result<Option<Conversation>, RapportError> {
    let (low, high) = sorted_pair(a, b);
    let (low, high) = (low.to_string(), high.to_string());
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM conversations WHERE pair_low = ?1 AND pair_high = ?2"),
                params![low, high],
                row_to_conversation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Conversations whose latest message is the agent's and is strictly
/// before `cutoff`. Blocked pairs and conversations with a pending scheduled
/// message are excluded. Longest-silent first.
pub async fn dormant(
    db: &Database,
    cutoff: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<DormantConversation>, RapportError> {
    let cutoff = ts(&cutoff);
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.agent_id, c.counterpart_id, c.created_at, m.created_at
                 FROM conversations c
                 JOIN messages m ON m.rowid = (
                     SELECT rowid FROM messages
                     WHERE conversation_id = c.id
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1
                 )
                 WHERE m.sender_id = c.agent_id
                   AND m.created_at < ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM blocks b
                       WHERE (b.blocker_id = c.agent_id AND b.blocked_id = c.counterpart_id)
                          OR (b.blocker_id = c.counterpart_id AND b.blocked_id = c.agent_id)
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM scheduled_messages s
                       WHERE s.conversation_id = c.id AND s.status = 'pending'
                   )
                 ORDER BY m.created_at ASC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![cutoff, limit], |row| {
                let last: String = row.get(4)?;
                Ok(DormantConversation {
                    conversation: row_to_conversation(row)?,
                    last_agent_message_at: parse_ts(4, &last)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
