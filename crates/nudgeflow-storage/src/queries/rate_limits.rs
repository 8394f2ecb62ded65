// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store-backed fixed-window counters.
//!
//! `try_consume` is a single conditional upsert: the counter only moves while
//! it is below the limit, so concurrent callers on the single writer can
//! never push it past the limit.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Consume one unit of `bucket` in the window starting at `window_start`.
///
/// Returns `false`, leaving the counter untouched, when the limit is reached.
pub async fn try_consume(
    db: &Database,
    owner: &str,
    bucket: &str,
    window_start: DateTime<Utc>,
    limit: u32,
) -> Result<bool, NudgeflowError> {
    if limit == 0 {
        return Ok(false);
    }
    let (owner, bucket, window) = (owner.to_string(), bucket.to_string(), format_ts(window_start));
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO rate_limits (owner, bucket, window_start, count) VALUES (?1, ?2, ?3, 1)
                 ON CONFLICT (owner, bucket, window_start)
                 DO UPDATE SET count = count + 1 WHERE count < ?4",
                params![owner, bucket, window, limit],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Current count of `bucket` in the window, without consuming.
pub async fn peek(
    db: &Database,
    owner: &str,
    bucket: &str,
    window_start: DateTime<Utc>,
) -> Result<u32, NudgeflowError> {
    let (owner, bucket, window) = (owner.to_string(), bucket.to_string(), format_ts(window_start));
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(count), 0) FROM rate_limits
                 WHERE owner = ?1 AND bucket = ?2 AND window_start = ?3",
                params![owner, bucket, window],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Drop windows that started before `before`.
pub async fn purge_before(db: &Database, before: DateTime<Utc>) -> Result<u64, NudgeflowError> {
    let before = format_ts(before);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM rate_limits WHERE window_start < ?1", params![before])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[tokio::test]
    async fn counter_stops_at_limit() {
        let db = Database::open_in_memory().await.unwrap();
        let window = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        for _ in 0..3 {
            assert!(try_consume(&db, "u1", "relations", window, 3).await.unwrap());
        }
        assert!(!try_consume(&db, "u1", "relations", window, 3).await.unwrap());
        assert_eq!(peek(&db, "u1", "relations", window).await.unwrap(), 3);

        let next = window + chrono::Duration::hours(1);
        assert!(try_consume(&db, "u1", "relations", next, 3).await.unwrap());
        assert_eq!(peek(&db, "u2", "relations", window).await.unwrap(), 0);
        assert!(!try_consume(&db, "u1", "other", window, 0).await.unwrap());

        assert_eq!(purge_before(&db, next).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_consumers_never_overshoot() {
        let db = Database::open_in_memory().await.unwrap();
        let window = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();

        let attempts = (0..20).map(|_| {
            let db = db.clone();
            tokio::spawn(async move { try_consume(&db, "u1", "relations", window, 5).await.unwrap() })
        });
        let granted = futures::future::join_all(attempts)
            .await
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(granted, 5);
        assert_eq!(peek(&db, "u1", "relations", window).await.unwrap(), 5);
    }
}
