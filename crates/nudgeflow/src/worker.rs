// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudgeflow worker` command implementation.
//!
//! Wires storage, the LLM adapters, the memory pipeline and the job
//! dispatcher together, then runs the worker loop until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use nudgeflow_config::NudgeflowConfig;
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::sinks::TracingSink;
use nudgeflow_core::traits::{CompletionAdapter, EmbeddingAdapter};
use nudgeflow_memory::{Collaborators, InMemoryCache, MemoryEvents, MemoryPipeline};
use nudgeflow_openai::{OpenAiCompletion, OpenAiEmbedder};
use nudgeflow_storage::Database;
use nudgeflow_worker::{PipelineDispatcher, Worker, install_signal_handler, recording};
use tracing::{info, warn};

/// How long to wait for queued memory events to be written after the loop stops.
const EVENT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the pipeline for `config` on top of an open database.
fn build_pipeline(
    db: &Database,
    config: &NudgeflowConfig,
) -> Result<(MemoryPipeline, tokio::task::JoinHandle<()>), NudgeflowError> {
    let completion: Arc<dyn CompletionAdapter> = Arc::new(OpenAiCompletion::new(&config.llm)?);
    let embedder: Arc<dyn EmbeddingAdapter> = Arc::new(OpenAiEmbedder::new(&config.llm)?);
    let cache = Arc::new(InMemoryCache::new());
    let (events, writer) = MemoryEvents::spawn(db.clone(), cache.clone());
    let pipeline = MemoryPipeline::new(
        db.clone(),
        Collaborators {
            completion,
            embedder,
            cache,
            sink: Arc::new(TracingSink),
        },
        events,
        config.features,
        config.memory.clone(),
        config.queue.max_attempts,
    );
    Ok((pipeline, writer))
}

/// Run the worker until SIGINT or SIGTERM.
pub async fn run_worker(config: &NudgeflowConfig) -> Result<(), NudgeflowError> {
    let db = Database::open(&config.storage.database_path, config.storage.wal_mode).await?;
    let (pipeline, writer) = build_pipeline(&db, config)?;
    recording::register_metrics();

    let worker = Worker::new(
        db.clone(),
        Arc::new(PipelineDispatcher::new(pipeline)),
        config.worker.clone(),
        &config.queue,
    );
    let shutdown = install_signal_handler();
    info!(database = %config.storage.database_path, "nudgeflow worker starting");
    worker.run(shutdown).await?;

    // Dropping the worker releases the last event sender so the writer can finish.
    drop(worker);
    if tokio::time::timeout(EVENT_FLUSH_TIMEOUT, writer).await.is_err() {
        warn!("memory event writer did not finish in time, some ledger entries may be lost");
    }

    db.close().await?;
    info!("nudgeflow worker stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pipeline_builds_from_default_config() {
        let mut config = nudgeflow_config::load_and_validate_str("").unwrap();
        config.llm.api_key = Some("test-key".to_string());
        let db = nudgeflow_test_utils::test_db().await;

        let (pipeline, _writer) = build_pipeline(&db, &config).unwrap();
        assert_eq!(pipeline.config().retrieval_limit, config.memory.retrieval_limit);
        assert_eq!(pipeline.services().completion.name(), "openai-completion");
    }

    #[tokio::test]
    async fn worker_refuses_to_start_without_api_key() {
        if std::env::var_os("NUDGEFLOW_LLM_API_KEY").is_some() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let mut config = nudgeflow_config::load_and_validate_str("").unwrap();
        config.storage.database_path = dir.path().join("nudgeflow.db").display().to_string();
        config.llm.api_key = None;

        let err = run_worker(&config).await.unwrap_err();
        assert!(matches!(err, NudgeflowError::Config(_)));
        assert!(err.to_string().contains("API key not found"));
    }
}
