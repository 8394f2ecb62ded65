// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous ingestion of minimal memory blocks.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::TraceEvent;
use nudgeflow_storage::queries::{blocks, settings};
use nudgeflow_storage::{JobType, MemoryBlock, NewJob, NewMemoryBlock};

use crate::MemoryPipeline;

impl MemoryPipeline {
    /// Record a minimal block and enqueue its enrichment.
    ///
    /// Returns `Ok(None)` without touching the store when memory is switched
    /// off globally, for the owner, or for the block's source feature. Never
    /// calls the completion or embedding service. Store failures are logged
    /// and reported as `Ok(None)` unless fail-fast is configured.
    pub async fn ingest_minimal(
        &self,
        block: NewMemoryBlock,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryBlock>, NudgeflowError> {
        let owner = block.owner.clone();
        match self.try_ingest(block, now).await {
            Ok(stored) => Ok(stored),
            Err(e) if self.features.fail_fast => Err(e),
            Err(e) => {
                warn!(owner = %owner, error = %e, "memory ingestion failed, continuing without it");
                Ok(None)
            }
        }
    }

    async fn try_ingest(
        &self,
        block: NewMemoryBlock,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryBlock>, NudgeflowError> {
        if !self.features.memory_enabled {
            return Ok(None);
        }
        if block.content.trim().is_empty() {
            return Err(NudgeflowError::InvalidArgument(
                "memory block content is empty".to_string(),
            ));
        }

        let user = settings::memory_settings(&self.db, &block.owner).await?;
        if !user.allows(&block.source_feature) {
            debug!(owner = %block.owner, feature = %block.source_feature, "memory disabled, skipping ingestion");
            return Ok(None);
        }

        let privacy = block.privacy_level.unwrap_or(user.default_privacy);
        let owner = block.owner.clone();
        let max_attempts = self.max_attempts;
        let job_owner = owner.clone();
        let (stored, job_id) = blocks::insert_with_job(
            &self.db,
            block,
            privacy,
            move |block_id| {
                NewJob::new(JobType::EnrichAndEmbed, job_owner, json!({ "block_id": block_id }))
                    .max_attempts(max_attempts)
            },
            now,
        )
        .await?;

        self.events.invalidate_owner(&owner);
        debug!(owner = %owner, block_id = %stored.id, job_id = %job_id, "memory block ingested");
        self.trace(
            TraceEvent::new("memory.ingested")
                .owner(owner)
                .attr("block_id", stored.id.clone())
                .attr("block_type", stored.block_type.as_ref())
                .attr("source_feature", stored.source_feature.clone()),
        );
        Ok(Some(stored))
    }
}
