// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only memory ledger.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{LedgerEntry, LedgerOp};
use crate::queries::parse_enum;

/// A ledger row about to be written.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub owner: String,
    pub block_id: String,
    pub operation: LedgerOp,
    pub actor: String,
    pub context: Option<String>,
    pub relevance_score: Option<f32>,
}

pub(crate) fn append_in(
    conn: &rusqlite::Connection,
    entry: &NewLedgerEntry,
    now: &str,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO memory_ledger (owner, block_id, operation, actor, context, relevance_score, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.owner,
            entry.block_id,
            entry.operation.as_ref(),
            entry.actor,
            entry.context,
            entry.relevance_score,
            now,
        ],
    )?;
    Ok(())
}

/// Append one entry.
pub async fn append(
    db: &Database,
    entry: NewLedgerEntry,
    now: DateTime<Utc>,
) -> Result<(), NudgeflowError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| append_in(conn, &entry, &now))
        .await
        .map_err(map_tr_err)
}

/// Full history of a block, oldest first. Only the owner's entries are visible.
pub async fn for_block(
    db: &Database,
    owner: &str,
    block_id: &str,
) -> Result<Vec<LedgerEntry>, NudgeflowError> {
    let owner = owner.to_string();
    let block_id = block_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, block_id, operation, actor, context, relevance_score, created_at
                 FROM memory_ledger WHERE owner = ?1 AND block_id = ?2 ORDER BY id ASC",
            )?;
            stmt.query_map(params![owner, block_id], |row| {
                Ok(LedgerEntry {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    block_id: row.get(2)?,
                    operation: parse_enum(3, row.get(3)?)?,
                    actor: row.get(4)?,
                    context: row.get(5)?,
                    relevance_score: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
