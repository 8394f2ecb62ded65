// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker loop.
//!
//! Polls the queue, keeps at most `max_concurrency` jobs in flight, races
//! each job against a hard timeout, and settles every attempt as completed
//! or failed. Failed attempts with attempts left are requeued after a
//! linear backoff via `available_at`, so no slot sleeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nudgeflow_config::{QueueConfig, WorkerConfig};
use nudgeflow_core::NudgeflowError;
use nudgeflow_storage::queries::{jobs, nudges, rate_limits};
use nudgeflow_storage::{Database, Job};

use crate::backoff::retry_delay;
use crate::dispatch::JobHandler;
use crate::health::HealthReport;
use crate::recording;
use crate::shutdown;

/// Rate-limit windows older than this many days are purged during cleanup.
const RATE_LIMIT_RETENTION_DAYS: i64 = 2;

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    /// Failed with attempts left; claimable again from `available_at`.
    Retrying { available_at: DateTime<Utc> },
    /// Failed with no attempts left. Stays `failed` for operators.
    Exhausted,
}

/// What one cleanup pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub completed_jobs: u64,
    pub expired_nudges: u64,
    pub rate_limit_windows: u64,
}

#[derive(Clone)]
pub struct Worker {
    db: Database,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
    retention_days: u32,
    started: Instant,
}

impl Worker {
    pub fn new(db: Database, handler: Arc<dyn JobHandler>, config: WorkerConfig, queue: &QueueConfig) -> Self {
        Self {
            db,
            handler,
            config,
            retention_days: queue.retention_days,
            started: Instant::now(),
        }
    }

    /// Run until `shutdown` is cancelled, then drain in-flight jobs.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), NudgeflowError> {
        let recovered = self.recover_stale(Utc::now()).await?;
        info!(
            max_concurrency = self.config.max_concurrency,
            recovered, "worker started"
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut health = tokio::time::interval(Duration::from_secs(self.config.health_interval_secs.max(1)));
        health.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cleanup = tokio::time::interval(Duration::from_secs(self.config.cleanup_interval_secs.max(1)));
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "job task panicked");
                    }
                    recording::set_in_flight(tasks.len());
                }
                _ = poll.tick() => self.fill(&mut tasks).await,
                _ = health.tick() => {
                    match self.health(tasks.len()).await {
                        Ok(report) => info!(
                            pending = report.queue.pending,
                            processing = report.queue.processing,
                            completed = report.queue.completed,
                            failed = report.queue.failed,
                            exhausted = report.queue.exhausted,
                            in_flight = report.in_flight,
                            uptime = %report.uptime_human(),
                            "worker health"
                        ),
                        Err(e) => warn!(error = %e, "health report failed"),
                    }
                }
                _ = cleanup.tick() => {
                    if let Err(e) = self.cleanup(Utc::now()).await {
                        warn!(error = %e, "cleanup pass failed");
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "worker stopping, no longer claiming jobs");
        let aborted = shutdown::drain(&mut tasks, self.config.shutdown_grace()).await;
        recording::set_in_flight(0);
        info!(aborted, "worker stopped");
        Ok(())
    }

    /// Claim up to the free capacity and spawn each job.
    async fn fill(&self, tasks: &mut JoinSet<()>) {
        let free = self.config.max_concurrency.saturating_sub(tasks.len());
        if free == 0 {
            return;
        }
        let claimed = match jobs::claim_next(&self.db, free, Utc::now()).await {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(error = %e, "claiming jobs failed");
                return;
            }
        };
        if claimed.is_empty() {
            return;
        }
        recording::record_claimed(claimed.len());
        for job in claimed {
            let worker = self.clone();
            tasks.spawn(async move {
                let job_id = job.id.clone();
                if let Err(e) = worker.process(job).await {
                    error!(job_id, error = %e, "could not settle job");
                }
            });
        }
        recording::set_in_flight(tasks.len());
    }

    /// Execute one claimed job and record the result.
    ///
    /// A timeout counts as a failure. The abandoned handler future is
    /// dropped; any call it had in flight is not awaited.
    pub async fn process(&self, job: Job) -> Result<JobOutcome, NudgeflowError> {
        let timer = Instant::now();
        debug!(job_id = %job.id, job_type = %job.job_type, attempts = job.attempts, "processing job");
        let result = tokio::time::timeout(self.config.job_timeout(), self.handler.handle(&job, Utc::now())).await;
        let elapsed = timer.elapsed();

        let (message, timed_out) = match result {
            Ok(Ok(())) => {
                jobs::complete(&self.db, &job.id, elapsed.as_millis() as i64, Utc::now()).await?;
                recording::record_completed(job.job_type, elapsed.as_secs_f64());
                debug!(job_id = %job.id, ms = elapsed.as_millis() as u64, "job completed");
                return Ok(JobOutcome::Completed);
            }
            Ok(Err(e)) => (e.to_string(), false),
            Err(_) => (
                NudgeflowError::Timeout {
                    duration: self.config.job_timeout(),
                }
                .to_string(),
                true,
            ),
        };
        recording::record_failed(job.job_type, timed_out);
        self.settle_failure(&job, &message, Utc::now()).await
    }

    async fn settle_failure(&self, job: &Job, message: &str, now: DateTime<Utc>) -> Result<JobOutcome, NudgeflowError> {
        let failed = jobs::fail(&self.db, &job.id, message, now).await?;
        if !failed.can_retry() {
            error!(
                job_id = %job.id,
                job_type = %job.job_type,
                attempts = failed.attempts,
                error = message,
                "job failed permanently"
            );
            return Ok(JobOutcome::Exhausted);
        }
        let delay = retry_delay(
            failed.attempts,
            Duration::from_millis(self.config.backoff_base_ms),
            Duration::from_millis(self.config.backoff_max_ms),
        );
        let available_at = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
        jobs::requeue_at(&self.db, &job.id, available_at).await?;
        warn!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempts = failed.attempts,
            retry_in_ms = delay.as_millis() as u64,
            error = message,
            "job failed, will retry"
        );
        Ok(JobOutcome::Retrying { available_at })
    }

    /// Fail jobs left `processing` by a dead worker and requeue those with
    /// attempts left. Returns how many were recovered.
    pub async fn recover_stale(&self, now: DateTime<Utc>) -> Result<usize, NudgeflowError> {
        let cutoff = now - chrono::Duration::seconds(self.config.stale_after_secs as i64);
        let ids = jobs::recover_stale(&self.db, cutoff, now).await?;
        for id in &ids {
            let requeued = jobs::requeue(&self.db, id, now).await?;
            warn!(job_id = %id, requeued, "recovered stale job");
        }
        Ok(ids.len())
    }

    pub async fn health(&self, in_flight: usize) -> Result<HealthReport, NudgeflowError> {
        let stats = jobs::stats(&self.db).await?;
        recording::set_queue_depth(&stats);
        Ok(HealthReport::new(stats, in_flight, self.started.elapsed()))
    }

    pub async fn cleanup(&self, now: DateTime<Utc>) -> Result<CleanupReport, NudgeflowError> {
        sweep(&self.db, self.retention_days, now).await
    }
}

/// Delete completed jobs older than `retention_days`, expired nudges, and
/// stale rate-limit windows.
pub async fn sweep(
    db: &Database,
    retention_days: u32,
    now: DateTime<Utc>,
) -> Result<CleanupReport, NudgeflowError> {
    let retention = chrono::Duration::days(i64::from(retention_days));
    let report = CleanupReport {
        completed_jobs: jobs::cleanup_old(db, now - retention).await?,
        expired_nudges: nudges::sweep_expired(db, now).await?,
        rate_limit_windows: rate_limits::purge_before(
            db,
            now - chrono::Duration::days(RATE_LIMIT_RETENTION_DAYS),
        )
        .await?,
    };
    if report != CleanupReport::default() {
        info!(
            completed_jobs = report.completed_jobs,
            expired_nudges = report.expired_nudges,
            rate_limit_windows = report.rate_limit_windows,
            "cleanup pass"
        );
    }
    Ok(report)
}
