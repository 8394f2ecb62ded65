// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator commands: `stats`, `failed`, `requeue`, `sweep`, `check-config`.
//!
//! Each command writes to the given sink so output can be asserted in tests.

use std::io::Write;

use chrono::Utc;
use nudgeflow_config::NudgeflowConfig;
use nudgeflow_core::NudgeflowError;
use nudgeflow_storage::Database;
use nudgeflow_storage::queries::jobs;

fn write_err(e: std::io::Error) -> NudgeflowError {
    NudgeflowError::Internal(format!("failed to write output: {e}"))
}

/// Print job counts by status.
pub async fn stats(db: &Database, json: bool, out: &mut impl Write) -> Result<(), NudgeflowError> {
    let stats = jobs::stats(db).await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?).map_err(write_err)?;
        return Ok(());
    }
    writeln!(out, "pending     {}", stats.pending).map_err(write_err)?;
    writeln!(out, "processing  {}", stats.processing).map_err(write_err)?;
    writeln!(out, "completed   {}", stats.completed).map_err(write_err)?;
    writeln!(out, "failed      {} ({} exhausted)", stats.failed, stats.exhausted).map_err(write_err)?;
    Ok(())
}

/// List failed jobs with no attempts left, newest first.
pub async fn failed(
    db: &Database,
    limit: usize,
    json: bool,
    out: &mut impl Write,
) -> Result<(), NudgeflowError> {
    let failed = jobs::list_failed(db, limit).await?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&failed)?).map_err(write_err)?;
        return Ok(());
    }
    if failed.is_empty() {
        writeln!(out, "no failed jobs").map_err(write_err)?;
        return Ok(());
    }
    for job in &failed {
        writeln!(
            out,
            "{}  {}  owner={}  attempts={}/{}  {}",
            job.id,
            job.job_type,
            job.owner,
            job.attempts,
            job.max_attempts,
            job.last_error.as_deref().unwrap_or("-"),
        )
        .map_err(write_err)?;
    }
    Ok(())
}

/// Requeue one failed job. Jobs with no attempts left stay failed.
pub async fn requeue(db: &Database, id: &str, out: &mut impl Write) -> Result<(), NudgeflowError> {
    if jobs::requeue(db, id, Utc::now()).await? {
        writeln!(out, "requeued {id}").map_err(write_err)?;
        return Ok(());
    }
    let job = jobs::get(db, id)
        .await?
        .ok_or_else(|| NudgeflowError::not_found("job", id))?;
    Err(NudgeflowError::InvalidArgument(format!(
        "job {id} is {} with {}/{} attempts and cannot be requeued",
        job.status, job.attempts, job.max_attempts
    )))
}

/// Run one cleanup pass now.
pub async fn sweep(
    db: &Database,
    retention_days: u32,
    out: &mut impl Write,
) -> Result<(), NudgeflowError> {
    let report = nudgeflow_worker::sweep(db, retention_days, Utc::now()).await?;
    writeln!(
        out,
        "removed {} completed jobs, {} expired nudges, {} rate-limit windows",
        report.completed_jobs, report.expired_nudges, report.rate_limit_windows
    )
    .map_err(write_err)?;
    Ok(())
}

/// Summary of the effective configuration. The API key is never printed.
pub fn describe_config(config: &NudgeflowConfig) -> String {
    let key = if config.llm.api_key.is_some() { "set" } else { "from environment" };
    format!(
        "configuration OK\n\
         database      {}\n\
         llm           {} ({}, {}; api key {key})\n\
         worker        concurrency={} timeout={}s poll={}ms\n\
         queue         max_attempts={} retention_days={}\n\
         llm nudges    {}\n",
        config.storage.database_path,
        config.llm.base_url,
        config.llm.completion_model,
        config.llm.embedding_model,
        config.worker.max_concurrency,
        config.worker.job_timeout_secs,
        config.worker.poll_interval_ms,
        config.queue.max_attempts,
        config.queue.retention_days,
        if config.features.llm_nudges_enabled { "enabled" } else { "disabled" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudgeflow_storage::{JobType, NewJob};
    use nudgeflow_test_utils::test_db;
    use serde_json::json;

    async fn exhausted_job(db: &Database) -> String {
        let job = NewJob::new(JobType::WeeklySummary, "u1", json!({})).max_attempts(1);
        let id = jobs::enqueue(db, job, Utc::now()).await.unwrap();
        jobs::claim_next(db, 1, Utc::now()).await.unwrap();
        jobs::fail(db, &id, "completion service unavailable", Utc::now()).await.unwrap();
        id
    }

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn stats_prints_counts() {
        let db = test_db().await;
        jobs::enqueue(&db, NewJob::new(JobType::SynthesizeContext, "u1", json!({})), Utc::now())
            .await
            .unwrap();
        exhausted_job(&db).await;

        let mut out = Vec::new();
        stats(&db, false, &mut out).await.unwrap();
        let out = text(out);
        assert!(out.contains("pending     1"));
        assert!(out.contains("failed      1 (1 exhausted)"));
    }

    #[tokio::test]
    async fn stats_json_is_parseable() {
        let db = test_db().await;
        let mut out = Vec::new();
        stats(&db, true, &mut out).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["pending"], 0);
    }

    #[tokio::test]
    async fn failed_lists_exhausted_jobs() {
        let db = test_db().await;
        let id = exhausted_job(&db).await;

        let mut out = Vec::new();
        failed(&db, 20, false, &mut out).await.unwrap();
        let out = text(out);
        assert!(out.contains(&id));
        assert!(out.contains("attempts=1/1"));
        assert!(out.contains("completion service unavailable"));
    }

    #[tokio::test]
    async fn failed_reports_empty_queue() {
        let db = test_db().await;
        let mut out = Vec::new();
        failed(&db, 20, false, &mut out).await.unwrap();
        assert_eq!(text(out), "no failed jobs\n");
    }

    #[tokio::test]
    async fn requeue_moves_retryable_job_to_pending() {
        let db = test_db().await;
        let id = jobs::enqueue(&db, NewJob::new(JobType::SynthesizeContext, "u1", json!({})), Utc::now())
            .await
            .unwrap();
        jobs::claim_next(&db, 1, Utc::now()).await.unwrap();
        jobs::fail(&db, &id, "boom", Utc::now()).await.unwrap();

        let mut out = Vec::new();
        requeue(&db, &id, &mut out).await.unwrap();
        assert_eq!(text(out), format!("requeued {id}\n"));
        assert_eq!(jobs::stats(&db).await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn requeue_refuses_exhausted_job() {
        let db = test_db().await;
        let id = exhausted_job(&db).await;
        let err = requeue(&db, &id, &mut Vec::<u8>::new()).await.unwrap_err();
        assert!(matches!(err, NudgeflowError::InvalidArgument(_)));
        assert!(err.to_string().contains("1/1 attempts"));
    }

    #[tokio::test]
    async fn requeue_unknown_job_is_not_found() {
        let db = test_db().await;
        let err = requeue(&db, "missing", &mut Vec::<u8>::new()).await.unwrap_err();
        assert!(matches!(err, NudgeflowError::NotFound { .. }));
    }

    #[tokio::test]
    async fn sweep_reports_removed_rows() {
        let db = test_db().await;
        let mut out = Vec::new();
        sweep(&db, 7, &mut out).await.unwrap();
        assert_eq!(
            text(out),
            "removed 0 completed jobs, 0 expired nudges, 0 rate-limit windows\n"
        );
    }

    #[test]
    fn describe_config_hides_api_key() {
        let mut config = nudgeflow_config::load_and_validate_str("").unwrap();
        config.llm.api_key = Some("sk-secret".to_string());
        let text = describe_config(&config);
        assert!(text.starts_with("configuration OK"));
        assert!(text.contains("api key set"));
        assert!(!text.contains("sk-secret"));
    }
}
