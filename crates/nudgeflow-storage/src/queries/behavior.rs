// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioral tables: journal entries, mood check-ins, goals, goal actions,
//! and tool completions. Written by the surrounding application, read by the
//! context integrator and the nudge rule packs.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{ActionCounts, Goal, GoalStatus, MoodCheckin};
use crate::queries::parse_enum;

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn row_to_mood(row: &Row<'_>) -> Result<MoodCheckin, rusqlite::Error> {
    Ok(MoodCheckin {
        id: row.get(0)?,
        owner: row.get(1)?,
        mood: row.get(2)?,
        note: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_goal(row: &Row<'_>) -> Result<Goal, rusqlite::Error> {
    Ok(Goal {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        status: parse_enum(3, row.get(3)?)?,
        progress: row.get(4)?,
        created_at: row.get(5)?,
        last_activity_at: row.get(6)?,
    })
}

pub async fn insert_journal_entry(
    db: &Database,
    owner: &str,
    content: &str,
    at: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let (id, owner, content, at) = (new_id(), owner.to_string(), content.to_string(), format_ts(at));
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO journal_entries (id, owner, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, owner, content, at],
            )?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Record a mood check-in on the 1 to 6 scale.
pub async fn insert_mood(
    db: &Database,
    owner: &str,
    mood: f64,
    note: Option<&str>,
    at: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    if !(1.0..=6.0).contains(&mood) {
        return Err(NudgeflowError::InvalidArgument(format!(
            "mood must be within 1..=6, got {mood}"
        )));
    }
    let (id, owner, at) = (new_id(), owner.to_string(), format_ts(at));
    let note = note.map(str::to_string);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO mood_checkins (id, owner, mood, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, owner, mood, note, at],
            )?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_goal(db: &Database, goal: Goal) -> Result<(), NudgeflowError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO goals (id, owner, title, status, progress, created_at, last_activity_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    goal.id,
                    goal.owner,
                    goal.title,
                    goal.status.as_ref(),
                    goal.progress,
                    goal.created_at,
                    goal.last_activity_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_goal_action(
    db: &Database,
    owner: &str,
    goal_id: &str,
    title: &str,
    at: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let (id, owner, goal_id, title, at) = (
        new_id(),
        owner.to_string(),
        goal_id.to_string(),
        title.to_string(),
        format_ts(at),
    );
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO goal_actions (id, goal_id, owner, title, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, goal_id, owner, title, at],
            )?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Complete a goal action and touch its goal's activity timestamp.
pub async fn complete_goal_action(
    db: &Database,
    action_id: &str,
    at: DateTime<Utc>,
) -> Result<bool, NudgeflowError> {
    let (action_id, at) = (action_id.to_string(), format_ts(at));
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE goal_actions SET completed = 1, completed_at = ?1 WHERE id = ?2 AND completed = 0",
                params![at, action_id],
            )?;
            if changed == 1 {
                tx.execute(
                    "UPDATE goals SET last_activity_at = ?1
                     WHERE id = (SELECT goal_id FROM goal_actions WHERE id = ?2)",
                    params![at, action_id],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn insert_tool_completion(
    db: &Database,
    owner: &str,
    tool_name: &str,
    at: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let (id, owner, tool_name, at) = (new_id(), owner.to_string(), tool_name.to_string(), format_ts(at));
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tool_completions (id, owner, tool_name, completed_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, owner, tool_name, at],
            )?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Timestamp of the owner's most recent journal entry.
pub async fn last_journal_at(db: &Database, owner: &str) -> Result<Option<String>, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT MAX(created_at) FROM journal_entries WHERE owner = ?1",
                params![owner],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Mood check-ins at or after `since`, oldest first.
pub async fn moods_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<Vec<MoodCheckin>, NudgeflowError> {
    let (owner, since) = (owner.to_string(), format_ts(since));
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, mood, note, created_at FROM mood_checkins
                 WHERE owner = ?1 AND created_at >= ?2 ORDER BY created_at ASC, rowid ASC",
            )?;
            stmt.query_map(params![owner, since], row_to_mood)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// The `limit` most recent mood check-ins, newest first.
pub async fn latest_moods(
    db: &Database,
    owner: &str,
    limit: usize,
) -> Result<Vec<MoodCheckin>, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, mood, note, created_at FROM mood_checkins
                 WHERE owner = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )?;
            stmt.query_map(params![owner, limit as i64], row_to_mood)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Goals in `status`, most recently active first.
pub async fn goals_with_status(
    db: &Database,
    owner: &str,
    status: GoalStatus,
) -> Result<Vec<Goal>, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, title, status, progress, created_at, last_activity_at FROM goals
                 WHERE owner = ?1 AND status = ?2
                 ORDER BY COALESCE(last_activity_at, created_at) DESC",
            )?;
            stmt.query_map(params![owner, status.as_ref()], row_to_goal)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Completed and total goal actions across all of the owner's goals.
pub async fn action_counts(db: &Database, owner: &str) -> Result<ActionCounts, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(completed), 0), COUNT(*) FROM goal_actions WHERE owner = ?1",
                params![owner],
                |row| {
                    Ok(ActionCounts {
                        completed: row.get::<_, i64>(0)?.max(0) as u64,
                        total: row.get::<_, i64>(1)?.max(0) as u64,
                    })
                },
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Goal actions completed at or after `since`.
pub async fn completed_actions_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<u64, NudgeflowError> {
    let (owner, since) = (owner.to_string(), format_ts(since));
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM goal_actions WHERE owner = ?1 AND completed = 1 AND completed_at >= ?2",
                params![owner, since],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Goals created at or after `since` with no completed action.
pub async fn goals_without_completions_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<u64, NudgeflowError> {
    let (owner, since) = (owner.to_string(), format_ts(since));
    db.connection()
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM goals g WHERE g.owner = ?1 AND g.created_at >= ?2
                 AND NOT EXISTS (SELECT 1 FROM goal_actions a WHERE a.goal_id = g.id AND a.completed = 1)",
                params![owner, since],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent tool completion as `(tool_name, completed_at)`.
pub async fn last_tool_completion(
    db: &Database,
    owner: &str,
) -> Result<Option<(String, String)>, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT tool_name, completed_at FROM tool_completions WHERE owner = ?1
                 ORDER BY completed_at DESC LIMIT 1",
                params![owner],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Timestamps of every activity at or after `since`: memory blocks, mood
/// check-ins, completed goal actions, and tool completions. Unordered.
pub async fn activity_timestamps(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<Vec<String>, NudgeflowError> {
    let (owner, since) = (owner.to_string(), format_ts(since));
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT created_at FROM memory_blocks WHERE owner = ?1 AND created_at >= ?2
                 UNION ALL SELECT created_at FROM mood_checkins WHERE owner = ?1 AND created_at >= ?2
                 UNION ALL SELECT completed_at FROM goal_actions
                     WHERE owner = ?1 AND completed = 1 AND completed_at >= ?2
                 UNION ALL SELECT completed_at FROM tool_completions WHERE owner = ?1 AND completed_at >= ?2",
            )?;
            stmt.query_map(params![owner, since], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Memory block counts per source feature at or after `since`, most used first.
pub async fn feature_usage_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<Vec<(String, u64)>, NudgeflowError> {
    let (owner, since) = (owner.to_string(), format_ts(since));
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT source_feature, COUNT(*) AS n FROM memory_blocks
                 WHERE owner = ?1 AND created_at >= ?2
                 GROUP BY source_feature ORDER BY n DESC, source_feature ASC",
            )?;
            stmt.query_map(params![owner, since], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)?.max(0) as u64))
            })?
            .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}
