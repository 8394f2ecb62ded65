// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job dispatch: one exhaustive match over [`JobType`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use nudgeflow_context::ContextIntegrator;
use nudgeflow_core::NudgeflowError;
use nudgeflow_memory::{EnrichOutcome, MemoryPipeline};
use nudgeflow_storage::queries::snapshots;
use nudgeflow_storage::{Job, JobType};

/// Executes one claimed job. An `Err` fails the attempt.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: &Job, now: DateTime<Utc>) -> Result<(), NudgeflowError>;
}

/// Routes each job type to the memory pipeline or the context integrator.
#[derive(Clone)]
pub struct PipelineDispatcher {
    pipeline: MemoryPipeline,
    integrator: ContextIntegrator,
}

impl PipelineDispatcher {
    pub fn new(pipeline: MemoryPipeline) -> Self {
        let integrator = ContextIntegrator::new(pipeline.db().clone());
        Self { pipeline, integrator }
    }

    async fn synthesize_context(&self, owner: &str, now: DateTime<Utc>) -> Result<(), NudgeflowError> {
        let summary = self.integrator.build_summary(owner, now).await;
        let value = serde_json::to_value(&summary)?;
        let id = snapshots::insert(self.pipeline.db(), owner, &value, now).await?;
        debug!(owner, snapshot_id = %id, "context snapshot stored");
        Ok(())
    }
}

fn block_id(job: &Job) -> Result<&str, NudgeflowError> {
    job.payload_str("block_id")
        .ok_or_else(|| NudgeflowError::InvalidArgument(format!("job {} has no block_id", job.id)))
}

#[async_trait]
impl JobHandler for PipelineDispatcher {
    async fn handle(&self, job: &Job, now: DateTime<Utc>) -> Result<(), NudgeflowError> {
        match job.job_type {
            JobType::EnrichAndEmbed => {
                let outcome = self.pipeline.enrich_and_embed(block_id(job)?, now).await?;
                if let EnrichOutcome::Enriched {
                    relation_job: Some(relation_job),
                } = &outcome
                {
                    debug!(job_id = %job.id, relation_job, "relation detection queued");
                }
                debug!(job_id = %job.id, ?outcome, "enrichment finished");
            }
            JobType::DetectRelations => {
                let outcome = self.pipeline.detect_relations(block_id(job)?, now).await?;
                debug!(job_id = %job.id, ?outcome, "relation detection finished");
            }
            JobType::SynthesizeContext => self.synthesize_context(&job.owner, now).await?,
            JobType::WeeklySummary => {
                if let Some(block) = self.pipeline.weekly_summary(&job.owner, now).await? {
                    info!(job_id = %job.id, block_id = %block.id, "weekly summary ingested");
                }
            }
        }
        Ok(())
    }
}
