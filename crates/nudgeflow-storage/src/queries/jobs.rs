// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable job queue operations.
//!
//! State machine: `pending -> processing -> completed`, `processing -> failed`,
//! `failed -> pending` only while `attempts < max_attempts`. Every transition
//! is a conditional update on the current status, so concurrent claimers
//! (in this process or another one sharing the file) can never both win.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{OptionalExtension, Row, TransactionBehavior, params};

use crate::database::{Database, map_tr_err};
use crate::models::{Job, JobStatus, NewJob, QueueStats};
use crate::queries::{parse_enum, parse_json, to_json};

const JOB_COLUMNS: &str = "id, job_type, owner, payload, status, priority, attempts, max_attempts, \
     last_error, created_at, available_at, started_at, completed_at, duration_ms";

fn row_to_job(row: &Row<'_>) -> Result<Job, rusqlite::Error> {
    Ok(Job {
        id: row.get(0)?,
        job_type: parse_enum(1, row.get(1)?)?,
        owner: row.get(2)?,
        payload: parse_json(3, row.get(3)?)?,
        status: parse_enum(4, row.get(4)?)?,
        priority: row.get(5)?,
        attempts: row.get(6)?,
        max_attempts: row.get(7)?,
        last_error: row.get(8)?,
        created_at: row.get(9)?,
        available_at: row.get(10)?,
        started_at: row.get(11)?,
        completed_at: row.get(12)?,
        duration_ms: row.get(13)?,
    })
}

/// Insert a job inside an existing transaction or connection.
pub(crate) fn insert_job(
    conn: &rusqlite::Connection,
    job: &NewJob,
    now: &str,
) -> Result<String, rusqlite::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO jobs (id, job_type, owner, payload, status, priority, attempts, max_attempts, \
         created_at, available_at) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, 0, ?6, ?7, ?7)",
        params![
            id,
            job.job_type.as_ref(),
            job.owner,
            to_json(&job.payload)?,
            job.priority,
            job.max_attempts,
            now,
        ],
    )?;
    Ok(id)
}

/// Enqueue a job. Returns its id.
pub async fn enqueue(
    db: &Database,
    job: NewJob,
    now: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let now = format_ts(now);
    db.connection()
        .call(move |conn| insert_job(conn, &job, &now))
        .await
        .map_err(map_tr_err)
}

/// Claim up to `limit` claimable jobs, highest priority first, then oldest.
///
/// A job is claimable when it is `pending`, has attempts left, and its
/// `available_at` has passed. Each job is moved to `processing` with a
/// conditional update; jobs another claimer won in the meantime are skipped.
/// The transaction takes the write lock up front so claimers on other
/// connections queue on the busy timeout instead of failing on lock upgrade.
pub async fn claim_next(
    db: &Database,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Job>, NudgeflowError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let candidates: Vec<Job> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs
                     WHERE status = 'pending' AND attempts < max_attempts AND available_at <= ?1
                     ORDER BY priority DESC, created_at ASC, rowid ASC
                     LIMIT ?2"
                ))?;
                stmt.query_map(params![now, limit as i64], row_to_job)?
                    .collect::<Result<_, _>>()?
            };

            let mut claimed = Vec::with_capacity(candidates.len());
            for job in candidates {
                let changed = tx.execute(
                    "UPDATE jobs SET status = 'processing', started_at = ?1
                     WHERE id = ?2 AND status = 'pending'",
                    params![now, job.id],
                )?;
                if changed == 1 {
                    claimed.push(Job {
                        status: JobStatus::Processing,
                        started_at: Some(now.clone()),
                        ..job
                    });
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a processing job completed.
pub async fn complete(
    db: &Database,
    id: &str,
    duration_ms: i64,
    now: DateTime<Utc>,
) -> Result<bool, NudgeflowError> {
    let id = id.to_string();
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = 'completed', completed_at = ?1, duration_ms = ?2,
                 last_error = NULL
                 WHERE id = ?3 AND status = 'processing'",
                params![now, duration_ms, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Mark a processing job failed, incrementing its attempt count.
///
/// Returns the updated job so the caller can decide on a retry.
pub async fn fail(
    db: &Database,
    id: &str,
    error: &str,
    now: DateTime<Utc>,
) -> Result<Job, NudgeflowError> {
    let id = id.to_string();
    let error = error.to_string();
    let now = format_ts(now);
    let lookup = id.clone();
    let job = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE jobs SET status = 'failed', attempts = attempts + 1, last_error = ?1,
                 completed_at = ?2
                 WHERE id = ?3 AND status = 'processing'",
                params![error, now, id],
            )?;
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                row_to_job,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;
    job.ok_or_else(|| NudgeflowError::not_found("job", lookup))
}

/// Move a failed job back to `pending`, claimable immediately.
///
/// Returns `false` when the job is not failed or has no attempts left.
pub async fn requeue(db: &Database, id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
    requeue_at(db, id, now).await
}

/// Move a failed job back to `pending`, claimable from `available_at`.
pub async fn requeue_at(
    db: &Database,
    id: &str,
    available_at: DateTime<Utc>,
) -> Result<bool, NudgeflowError> {
    let id = id.to_string();
    let available_at = format_ts(available_at);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE jobs SET status = 'pending', available_at = ?1, started_at = NULL,
                 completed_at = NULL
                 WHERE id = ?2 AND status = 'failed' AND attempts < max_attempts",
                params![available_at, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch one job by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<Job>, NudgeflowError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id],
                row_to_job,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Counts per status for health reporting.
pub async fn stats(db: &Database) -> Result<QueueStats, NudgeflowError> {
    db.connection()
        .call(|conn| {
            let mut stats = QueueStats::default();
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (status, count) = row?;
                let count = count.max(0) as u64;
                match status.parse::<JobStatus>() {
                    Ok(JobStatus::Pending) => stats.pending = count,
                    Ok(JobStatus::Processing) => stats.processing = count,
                    Ok(JobStatus::Completed) => stats.completed = count,
                    Ok(JobStatus::Failed) => stats.failed = count,
                    Err(_) => {}
                }
            }
            let exhausted: i64 = conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = 'failed' AND attempts >= max_attempts",
                [],
                |row| row.get(0),
            )?;
            stats.exhausted = exhausted.max(0) as u64;
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

/// Purge completed jobs finished before `completed_before`. Failed jobs are kept.
pub async fn cleanup_old(
    db: &Database,
    completed_before: DateTime<Utc>,
) -> Result<u64, NudgeflowError> {
    let cutoff = format_ts(completed_before);
    db.connection()
        .call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM jobs WHERE status = 'completed' AND completed_at < ?1",
                params![cutoff],
            )?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

/// Fail `processing` jobs started before `started_before`, counting the attempt.
///
/// Recovers jobs orphaned by a crashed worker. Returns the recovered ids.
pub async fn recover_stale(
    db: &Database,
    started_before: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<String>, NudgeflowError> {
    let cutoff = format_ts(started_before);
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM jobs WHERE status = 'processing' AND started_at < ?1",
                )?;
                stmt.query_map(params![cutoff], |row| row.get(0))?
                    .collect::<Result<_, _>>()?
            };
            for id in &ids {
                tx.execute(
                    "UPDATE jobs SET status = 'failed', attempts = attempts + 1,
                     last_error = 'worker lost while processing', completed_at = ?1
                     WHERE id = ?2 AND status = 'processing'",
                    params![now, id],
                )?;
            }
            tx.commit()?;
            Ok(ids)
        })
        .await
        .map_err(map_tr_err)
}

/// Failed jobs with no attempts left, newest first.
pub async fn list_failed(db: &Database, limit: usize) -> Result<Vec<Job>, NudgeflowError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM jobs
                 WHERE status = 'failed' AND attempts >= max_attempts
                 ORDER BY completed_at DESC LIMIT ?1"
            ))?;
            stmt.query_map(params![limit as i64], row_to_job)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;
    use crate::models::JobType;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn enrich(owner: &str) -> NewJob {
        NewJob::new(JobType::EnrichAndEmbed, owner, json!({"block_id": "b1"}))
    }

    #[tokio::test]
    async fn claim_orders_by_priority_then_age() {
        let db = Database::open_in_memory().await.unwrap();
        let low = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        let high = enqueue(&db, enrich("u1").priority(5), t0() + Duration::seconds(1))
            .await
            .unwrap();
        let low_later = enqueue(&db, enrich("u1"), t0() + Duration::seconds(2))
            .await
            .unwrap();

        let claimed = claim_next(&db, 10, t0() + Duration::seconds(5)).await.unwrap();
        let ids: Vec<_> = claimed.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![high, low, low_later]);
        assert!(claimed.iter().all(|j| j.status == JobStatus::Processing));

        assert!(claim_next(&db, 10, t0() + Duration::seconds(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_respects_limit_and_availability() {
        let db = Database::open_in_memory().await.unwrap();
        enqueue(&db, enrich("u1"), t0()).await.unwrap();
        enqueue(&db, enrich("u1"), t0()).await.unwrap();
        enqueue(&db, enrich("u1"), t0() + Duration::hours(1)).await.unwrap();

        assert_eq!(claim_next(&db, 1, t0()).await.unwrap().len(), 1);
        assert_eq!(claim_next(&db, 5, t0()).await.unwrap().len(), 1);
        assert!(claim_next(&db, 5, t0()).await.unwrap().is_empty());
        assert_eq!(claim_next(&db, 5, t0() + Duration::hours(2)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fail_then_requeue_until_exhausted() {
        let db = Database::open_in_memory().await.unwrap();
        let id = enqueue(&db, enrich("u1").max_attempts(2), t0()).await.unwrap();

        claim_next(&db, 1, t0()).await.unwrap();
        let job = fail(&db, &id, "boom", t0()).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
        assert!(requeue(&db, &id, t0()).await.unwrap());

        claim_next(&db, 1, t0()).await.unwrap();
        let job = fail(&db, &id, "boom again", t0()).await.unwrap();
        assert_eq!(job.attempts, 2);
        assert!(!requeue(&db, &id, t0()).await.unwrap());
        assert!(claim_next(&db, 1, t0()).await.unwrap().is_empty());

        let failed = list_failed(&db, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, id);
        assert_eq!(stats(&db).await.unwrap().exhausted, 1);
    }

    #[tokio::test]
    async fn requeue_only_applies_to_failed_jobs() {
        let db = Database::open_in_memory().await.unwrap();
        let id = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        assert!(!requeue(&db, &id, t0()).await.unwrap());
        claim_next(&db, 1, t0()).await.unwrap();
        assert!(!requeue(&db, &id, t0()).await.unwrap());
    }

    #[tokio::test]
    async fn requeue_at_delays_next_claim() {
        let db = Database::open_in_memory().await.unwrap();
        let id = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        claim_next(&db, 1, t0()).await.unwrap();
        fail(&db, &id, "transient", t0()).await.unwrap();
        assert!(requeue_at(&db, &id, t0() + Duration::seconds(4)).await.unwrap());

        assert!(claim_next(&db, 1, t0() + Duration::seconds(3)).await.unwrap().is_empty());
        let claimed = claim_next(&db, 1, t0() + Duration::seconds(4)).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
    }

    #[tokio::test]
    async fn complete_records_duration_and_cleanup_purges() {
        let db = Database::open_in_memory().await.unwrap();
        let id = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        claim_next(&db, 1, t0()).await.unwrap();
        assert!(complete(&db, &id, 120, t0()).await.unwrap());
        assert!(!complete(&db, &id, 120, t0()).await.unwrap());

        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.duration_ms, Some(120));

        assert_eq!(cleanup_old(&db, t0()).await.unwrap(), 0);
        assert_eq!(cleanup_old(&db, t0() + Duration::days(8)).await.unwrap(), 1);
        assert!(get(&db, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recover_stale_fails_orphaned_processing_jobs() {
        let db = Database::open_in_memory().await.unwrap();
        let old = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        claim_next(&db, 1, t0()).await.unwrap();
        let fresh = enqueue(&db, enrich("u1"), t0()).await.unwrap();
        claim_next(&db, 1, t0() + Duration::minutes(10)).await.unwrap();

        let recovered = recover_stale(&db, t0() + Duration::minutes(5), t0() + Duration::minutes(11))
            .await
            .unwrap();
        assert_eq!(recovered, vec![old.clone()]);
        let job = get(&db, &old).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(
            get(&db, &fresh).await.unwrap().unwrap().status,
            JobStatus::Processing
        );
    }

    #[tokio::test]
    async fn stats_count_each_status() {
        let db = Database::open_in_memory().await.unwrap();
        for _ in 0..3 {
            enqueue(&db, enrich("u1"), t0()).await.unwrap();
        }
        let claimed = claim_next(&db, 2, t0()).await.unwrap();
        complete(&db, &claimed[0].id, 5, t0()).await.unwrap();
        fail(&db, &claimed[1].id, "x", t0()).await.unwrap();

        let stats = stats(&db).await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 0);
        assert_eq!(stats.total(), 3);
    }
}
