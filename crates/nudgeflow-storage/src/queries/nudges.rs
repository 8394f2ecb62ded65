// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge persistence and lifecycle transitions.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{Nudge, Surface};
use crate::queries::{parse_enum, parse_json, to_json};

const NUDGE_COLUMNS: &str = "id, owner, kind, surface, title, message, cta_label, cta_payload, \
     priority, source_rule, explanation, context_snapshot, created_at, shown_at, accepted_at, \
     dismissed_at, completed_at, expires_at";

fn row_to_nudge(row: &Row<'_>) -> Result<Nudge, rusqlite::Error> {
    Ok(Nudge {
        id: row.get(0)?,
        owner: row.get(1)?,
        kind: parse_enum(2, row.get(2)?)?,
        surface: parse_enum(3, row.get(3)?)?,
        title: row.get(4)?,
        message: row.get(5)?,
        cta_label: row.get(6)?,
        cta_payload: parse_json(7, row.get(7)?)?,
        priority: row.get(8)?,
        source_rule: row.get(9)?,
        explanation: row.get(10)?,
        context_snapshot: parse_json(11, row.get(11)?)?,
        created_at: row.get(12)?,
        shown_at: row.get(13)?,
        accepted_at: row.get(14)?,
        dismissed_at: row.get(15)?,
        completed_at: row.get(16)?,
        expires_at: row.get(17)?,
    })
}

/// Insert nudges in one transaction.
pub async fn insert_many(db: &Database, nudges: Vec<Nudge>) -> Result<(), NudgeflowError> {
    if nudges.is_empty() {
        return Ok(());
    }
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            for n in &nudges {
                tx.execute(
                    &format!(
                        "INSERT INTO nudges ({NUDGE_COLUMNS}) VALUES
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                    ),
                    params![
                        n.id,
                        n.owner,
                        n.kind.as_ref(),
                        n.surface.as_ref(),
                        n.title,
                        n.message,
                        n.cta_label,
                        to_json(&n.cta_payload)?,
                        n.priority,
                        n.source_rule,
                        n.explanation,
                        to_json(&n.context_snapshot)?,
                        n.created_at,
                        n.shown_at,
                        n.accepted_at,
                        n.dismissed_at,
                        n.completed_at,
                        n.expires_at,
                    ],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Unexpired nudges not yet acted on, highest priority first.
pub async fn active(
    db: &Database,
    owner: &str,
    surface: Option<Surface>,
    now: DateTime<Utc>,
) -> Result<Vec<Nudge>, NudgeflowError> {
    let owner = owner.to_string();
    let surface = surface.map(|s| s.as_ref().to_string());
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NUDGE_COLUMNS} FROM nudges
                 WHERE owner = ?1 AND expires_at > ?2 AND (?3 IS NULL OR surface = ?3)
                   AND accepted_at IS NULL AND dismissed_at IS NULL AND completed_at IS NULL
                 ORDER BY priority DESC, created_at ASC"
            ))?;
            stmt.query_map(params![owner, now, surface], row_to_nudge)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Nudges whose `shown_at` falls within `[start, end)`.
pub async fn shown_between(
    db: &Database,
    owner: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<u32, NudgeflowError> {
    let (owner, start, end) = (owner.to_string(), format_ts(start), format_ts(end));
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM nudges WHERE owner = ?1 AND shown_at >= ?2 AND shown_at < ?3",
                params![owner, start, end],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// User interaction with a nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Shown,
    Accepted,
    Dismissed,
    Completed,
}

impl Interaction {
    fn column(self) -> &'static str {
        match self {
            Self::Shown => "shown_at",
            Self::Accepted => "accepted_at",
            Self::Dismissed => "dismissed_at",
            Self::Completed => "completed_at",
        }
    }
}

/// Stamp an interaction on the owner's nudge. Each timestamp is set once.
///
/// Returns `false` when the nudge is missing, not the owner's, or already stamped.
pub async fn record_interaction(
    db: &Database,
    owner: &str,
    nudge_id: &str,
    interaction: Interaction,
    now: DateTime<Utc>,
) -> Result<bool, NudgeflowError> {
    let (owner, nudge_id, now) = (owner.to_string(), nudge_id.to_string(), format_ts(now));
    let column = interaction.column();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE nudges SET {column} = ?1 WHERE id = ?2 AND owner = ?3 AND {column} IS NULL"
                ),
                params![now, nudge_id, owner],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Expired nudges shown within this many hours are kept, so the daily
/// budget still sees them on any local calendar day.
pub const SHOWN_RETENTION_HOURS: i64 = 48;

/// Delete expired nudges, except those shown in the last
/// [`SHOWN_RETENTION_HOURS`].
pub async fn sweep_expired(db: &Database, now: DateTime<Utc>) -> Result<u64, NudgeflowError> {
    let shown_cutoff = format_ts(now - chrono::Duration::hours(SHOWN_RETENTION_HOURS));
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM nudges WHERE expires_at <= ?1
                 AND (shown_at IS NULL OR shown_at < ?2)",
                params![now, shown_cutoff],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}
