// SPDX-FileCopyrightText: 2026 Rapport Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile and compatibility-match lookups.
//!
//! Both tables belong to other systems; the upserts exist for seeding.

use chrono::Utc;
use rapport_core::RapportError;
use rapport_core::types::{MatchCandidate, Profile};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, json_err, map_tr_err, ts};

pub async fn get(db: &Database, id: &str) -> Result<Option<Profile>, RapportError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, display_name, birth_date, birth_place, attributes,
                        personality_prompt, utc_offset_minutes, is_agent
                 FROM profiles WHERE id = ?1",
                params![id],
                |row| {
                    let attributes: Option<String> = row.get(4)?;
                    Ok(Profile {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                        birth_date: row.get(2)?,
                        birth_place: row.get(3)?,
                        attributes: attributes
                            .as_deref()
                            .map(serde_json::from_str)
                            .transpose()
                            .map_err(|e| json_err(4, e))?,
                        personality_prompt: row.get(5)?,
                        utc_offset_minutes: row.get(6)?,
                        is_agent: row.get(7)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert(db: &Database, profile: &Profile) -> Result<(), RapportError> {
    let attributes = profile
        .attributes
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RapportError::Storage { source: Box::new(e) })?;
    let profile = profile.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO profiles
                     (id, display_name, birth_date, birth_place, attributes,
                      personality_prompt, utc_offset_minutes, is_agent)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = excluded.display_name,
                     birth_date = excluded.birth_date,
                     birth_place = excluded.birth_place,
                     attributes = excluded.attributes,
                     personality_prompt = excluded.personality_prompt,
                     utc_offset_minutes = excluded.utc_offset_minutes,
                     is_agent = excluded.is_agent",
                params![
                    profile.id,
                    profile.display_name,
                    profile.birth_date,
                    profile.birth_place,
                    attributes,
                    profile.personality_prompt,
                    profile.utc_offset_minutes,
                    profile.is_agent,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn upsert_match(db: &Database, candidate: &MatchCandidate) -> Result<(), RapportError> {
    let candidate = candidate.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO matches (agent_id, counterpart_id, score, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(agent_id, counterpart_id) DO UPDATE SET score = excluded.score",
                params![
                    candidate.agent_id,
                    candidate.counterpart_id,
                    candidate.score,
                    ts(&Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Matches with no conversation yet and no block in either direction,
/// best score first.
pub async fn open_matches(db: &Database, limit: usize) -> Result<Vec<MatchCandidate>, RapportError> {
    let limit = limit as i64;
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT m.agent_id, m.counterpart_id, m.score
                 FROM matches m
                 WHERE m.agent_id <> m.counterpart_id
                   AND NOT EXISTS (
                       SELECT 1 FROM conversations c
                       WHERE c.pair_low = min(m.agent_id, m.counterpart_id)
                         AND c.pair_high = max(m.agent_id, m.counterpart_id)
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM blocks b
                       WHERE (b.blocker_id = m.agent_id AND b.blocked_id = m.counterpart_id)
                          OR (b.blocker_id = m.counterpart_id AND b.blocked_id = m.agent_id)
                   )
                 ORDER BY m.score DESC, m.created_at ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], |row| {
                Ok(MatchCandidate {
                    agent_id: row.get(0)?,
                    counterpart_id: row.get(1)?,
                    score: row.get(2)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
