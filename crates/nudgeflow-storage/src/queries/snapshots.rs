// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored context summary snapshots.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// Store a JSON snapshot. Returns its id.
pub async fn insert(
    db: &Database,
    owner: &str,
    summary: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let id = uuid::Uuid::new_v4().to_string();
    let owner = owner.to_string();
    let summary = serde_json::to_string(summary)?;
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO context_snapshots (id, owner, summary, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, owner, summary, now],
            )?;
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent snapshot for `owner` as `(created_at, summary)`.
pub async fn latest(
    db: &Database,
    owner: &str,
) -> Result<Option<(String, serde_json::Value)>, NudgeflowError> {
    let owner = owner.to_string();
    let row: Option<(String, String)> = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT created_at, summary FROM context_snapshots WHERE owner = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![owner],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    row.map(|(created_at, raw)| -> Result<_, NudgeflowError> {
        Ok((created_at, serde_json::from_str(&raw)?))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[tokio::test]
    async fn latest_snapshot_wins() {
        let db = Database::open_in_memory().await.unwrap();
        let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        insert(&db, "u1", &serde_json::json!({"themes": ["sleep"]}), t0).await.unwrap();
        insert(&db, "u1", &serde_json::json!({"themes": ["work"]}), t0 + chrono::Duration::hours(1))
            .await
            .unwrap();

        let (_, summary) = latest(&db, "u1").await.unwrap().unwrap();
        assert_eq!(summary["themes"][0], "work");
        assert!(latest(&db, "u2").await.unwrap().is_none());
    }
}
