// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker runtime tests against an in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use nudgeflow_config::{FeatureConfig, MemoryConfig, QueueConfig, WorkerConfig};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::sinks::NoopSink;
use nudgeflow_memory::{Collaborators, InMemoryCache, MemoryEvents, MemoryPipeline};
use nudgeflow_storage::queries::{blocks, jobs, snapshots};
use nudgeflow_storage::{
    BlockStatus, BlockType, Database, Job, JobStatus, JobType, NewJob, NewMemoryBlock, QueueStats,
};
use nudgeflow_test_utils::{MockCompletion, MockEmbedder, test_db};
use nudgeflow_worker::{JobHandler, JobOutcome, PipelineDispatcher, Worker};

/// Handler that sleeps, optionally fails, and tracks peak concurrency.
#[derive(Default)]
struct StubHandler {
    delay: Duration,
    fail: bool,
    running: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl JobHandler for StubHandler {
    async fn handle(&self, _job: &Job, _now: DateTime<Utc>) -> Result<(), NudgeflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        if self.fail {
            Err(NudgeflowError::provider("completion service unavailable"))
        } else {
            Ok(())
        }
    }
}

fn config() -> WorkerConfig {
    WorkerConfig {
        poll_interval_ms: 10,
        job_timeout_secs: 1,
        shutdown_grace_secs: 1,
        ..WorkerConfig::default()
    }
}

fn worker(db: &Database, handler: Arc<dyn JobHandler>, config: WorkerConfig) -> Worker {
    Worker::new(db.clone(), handler, config, &QueueConfig::default())
}

async fn enqueue(db: &Database, max_attempts: u32) -> String {
    let job = NewJob::new(JobType::SynthesizeContext, "u1", json!({})).max_attempts(max_attempts);
    jobs::enqueue(db, job, Utc::now()).await.unwrap()
}

async fn claim_one(db: &Database) -> Job {
    jobs::claim_next(db, 1, Utc::now()).await.unwrap().remove(0)
}

/// Poll queue stats every 20ms for up to 5s until `done` holds.
async fn wait_for(db: &Database, done: impl Fn(&QueueStats) -> bool) {
    for _ in 0..250 {
        if done(&jobs::stats(db).await.unwrap()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("queue never reached the expected state");
}

#[tokio::test]
async fn successful_job_completes() {
    let db = test_db().await;
    let id = enqueue(&db, 3).await;
    let w = worker(&db, Arc::new(StubHandler::default()), config());

    let outcome = w.process(claim_one(&db).await).await.unwrap();

    assert_eq!(outcome, JobOutcome::Completed);
    let job = jobs::get(&db, &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.duration_ms.is_some());
}

#[tokio::test]
async fn failure_is_requeued_with_backoff() {
    let db = test_db().await;
    let id = enqueue(&db, 3).await;
    let handler = Arc::new(StubHandler {
        fail: true,
        ..StubHandler::default()
    });
    let w = worker(&db, handler, config());

    let outcome = w.process(claim_one(&db).await).await.unwrap();

    let JobOutcome::Retrying { available_at } = outcome else {
        panic!("expected a retry, got {outcome:?}");
    };
    let job = jobs::get(&db, &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().contains("completion service unavailable"));
    // Base delay 2s times one attempt.
    assert!(available_at > Utc::now() + chrono::Duration::milliseconds(1500));
    assert!(jobs::claim_next(&db, 5, Utc::now()).await.unwrap().is_empty());
    let later = available_at + chrono::Duration::milliseconds(1);
    assert_eq!(jobs::claim_next(&db, 5, later).await.unwrap().len(), 1);
}

#[tokio::test]
async fn last_attempt_stays_failed() {
    let db = test_db().await;
    let id = enqueue(&db, 1).await;
    let handler = Arc::new(StubHandler {
        fail: true,
        ..StubHandler::default()
    });
    let w = worker(&db, handler, config());

    let outcome = w.process(claim_one(&db).await).await.unwrap();

    assert_eq!(outcome, JobOutcome::Exhausted);
    let failed = jobs::list_failed(&db, 10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, id);
    assert_eq!(jobs::stats(&db).await.unwrap().exhausted, 1);
}

#[tokio::test]
async fn timeout_counts_as_failure() {
    let db = test_db().await;
    let id = enqueue(&db, 3).await;
    let handler = Arc::new(StubHandler {
        delay: Duration::from_secs(30),
        ..StubHandler::default()
    });
    let w = worker(&db, handler, config());

    let outcome = w.process(claim_one(&db).await).await.unwrap();

    assert!(matches!(outcome, JobOutcome::Retrying { .. }));
    let job = jobs::get(&db, &id).await.unwrap().unwrap();
    assert_eq!(job.attempts, 1);
    assert!(job.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn stale_processing_jobs_are_recovered() {
    let db = test_db().await;
    let id = enqueue(&db, 3).await;
    let long_ago = Utc::now() - chrono::Duration::minutes(10);
    // Claimed by a worker that then died.
    jobs::claim_next(&db, 1, Utc::now()).await.unwrap();
    let w = worker(&db, Arc::new(StubHandler::default()), config());

    assert_eq!(w.recover_stale(long_ago).await.unwrap(), 0);
    let recovered = w.recover_stale(Utc::now() + chrono::Duration::minutes(10)).await.unwrap();

    assert_eq!(recovered, 1);
    let job = jobs::get(&db, &id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn cleanup_removes_old_completed_jobs() {
    let db = test_db().await;
    enqueue(&db, 3).await;
    let w = worker(&db, Arc::new(StubHandler::default()), config());
    w.process(claim_one(&db).await).await.unwrap();

    let report = w.cleanup(Utc::now()).await.unwrap();
    assert_eq!(report.completed_jobs, 0);

    let report = w.cleanup(Utc::now() + chrono::Duration::days(8)).await.unwrap();
    assert_eq!(report.completed_jobs, 1);
    assert_eq!(jobs::stats(&db).await.unwrap().total(), 0);
}

#[tokio::test]
async fn run_respects_max_concurrency_and_drains() {
    let db = test_db().await;
    for _ in 0..6 {
        enqueue(&db, 3).await;
    }
    let handler = Arc::new(StubHandler {
        delay: Duration::from_millis(50),
        ..StubHandler::default()
    });
    let w = worker(
        &db,
        handler.clone(),
        WorkerConfig {
            max_concurrency: 2,
            ..config()
        },
    );
    let token = CancellationToken::new();
    let run = tokio::spawn({
        let token = token.clone();
        async move { w.run(token).await }
    });

    wait_for(&db, |stats| stats.completed == 6).await;
    token.cancel();
    run.await.unwrap().unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 6);
    assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    let report = Worker::new(db.clone(), handler, config(), &QueueConfig::default())
        .health(0)
        .await
        .unwrap();
    assert_eq!(report.queue.completed, 6);
    assert_eq!(report.queue.pending, 0);
}

async fn pipeline(db: &Database) -> MemoryPipeline {
    let cache = Arc::new(InMemoryCache::new());
    let (events, _writer) = MemoryEvents::spawn(db.clone(), cache.clone());
    MemoryPipeline::new(
        db.clone(),
        Collaborators {
            completion: Arc::new(MockCompletion::new()),
            embedder: Arc::new(MockEmbedder::new()),
            cache,
            sink: Arc::new(NoopSink),
        },
        events,
        FeatureConfig::default(),
        MemoryConfig::default(),
        3,
    )
}

#[tokio::test]
async fn dispatcher_drives_the_memory_pipeline() {
    let db = test_db().await;
    let pipeline = pipeline(&db).await;
    let block = pipeline
        .ingest_minimal(
            NewMemoryBlock::new("u1", BlockType::JournalEntry, "journal", "Took a long walk after work"),
            Utc::now(),
        )
        .await
        .unwrap()
        .unwrap();
    jobs::enqueue(&db, NewJob::new(JobType::SynthesizeContext, "u1", json!({})), Utc::now())
        .await
        .unwrap();
    jobs::enqueue(&db, NewJob::new(JobType::WeeklySummary, "u2", json!({})), Utc::now())
        .await
        .unwrap();

    let w = worker(&db, Arc::new(PipelineDispatcher::new(pipeline)), config());
    let token = CancellationToken::new();
    let run = tokio::spawn({
        let token = token.clone();
        async move { w.run(token).await }
    });

    wait_for(&db, |stats| {
        stats.pending == 0 && stats.processing == 0 && stats.completed >= 3
    })
    .await;
    token.cancel();
    run.await.unwrap().unwrap();

    let stored = blocks::get(&db, &block.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BlockStatus::Active);
    assert!(stored.embedding.is_some());
    let (_, snapshot) = snapshots::latest(&db, "u1").await.unwrap().unwrap();
    assert_eq!(snapshot["owner"], "u1");
    assert_eq!(jobs::stats(&db).await.unwrap().failed, 0);
}

#[tokio::test]
async fn dispatcher_rejects_payload_without_block_id() {
    let db = test_db().await;
    let dispatcher = PipelineDispatcher::new(pipeline(&db).await);
    jobs::enqueue(&db, NewJob::new(JobType::EnrichAndEmbed, "u1", json!({})), Utc::now())
        .await
        .unwrap();
    let job = claim_one(&db).await;

    let err = dispatcher.handle(&job, Utc::now()).await.unwrap_err();
    assert!(matches!(err, NudgeflowError::InvalidArgument(_)));
}
