// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enrichment and embedding job handler.
//!
//! Enrichment metadata is best-effort: a failed or malformed completion
//! leaves the block with empty metadata. The embedding is required; if it
//! fails the block is marked `failed` and the error is returned so the job
//! can be retried.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::{CompletionRequest, TraceEvent};
use nudgeflow_storage::queries::{blocks, jobs, rate_limits};
use nudgeflow_storage::{BlockStatus, Enrichment, JobType, MemoryBlock, NewJob};

use crate::MemoryPipeline;
use crate::parse::{normalize_labels, parse_reply, truncate_chars};
use crate::relations::{RELATION_BUCKET, hour_window};

const ENRICHMENT_SYSTEM_PROMPT: &str = "You annotate entries from a personal coaching app. \
Reply with a single JSON object and nothing else.";

const ENRICHMENT_PROMPT: &str = r#"Annotate the entry below. Reply with JSON:
{
  "summary": one sentence, at most 200 characters,
  "sentiment": "positive" | "neutral" | "negative" | "mixed",
  "emotional_tone": one word such as "hopeful", "anxious", "calm",
  "themes": up to 5 short lowercase topics,
  "tags": up to 8 short lowercase keywords,
  "is_crisis": true if the entry suggests risk of self-harm or acute crisis,
  "is_sensitive": true if it mentions health, trauma, or other sensitive matters,
  "relevance_score": 0.0 to 1.0, how useful this is for future coaching
}

Entry type: {block_type}
Source: {source_feature}
Entry:
{content}"#;

const MAX_THEMES: usize = 5;
const MAX_TAGS: usize = 8;
const MAX_SUMMARY_CHARS: usize = 200;

/// What the enrichment job did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    /// Block is now `active`. Carries the relation-detection job id, if one was enqueued.
    Enriched { relation_job: Option<String> },
    /// Block was deleted before the job ran.
    Missing,
    /// Block was already active.
    AlreadyActive,
}

/// Reply shape requested by [`ENRICHMENT_PROMPT`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnrichmentReply {
    summary: Option<String>,
    sentiment: Option<String>,
    emotional_tone: Option<String>,
    themes: Vec<String>,
    tags: Vec<String>,
    is_crisis: bool,
    is_sensitive: bool,
    relevance_score: Option<f32>,
}

impl From<EnrichmentReply> for Enrichment {
    fn from(reply: EnrichmentReply) -> Self {
        let clean = |s: Option<String>| {
            s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        };
        Enrichment {
            summary: clean(reply.summary).map(|s| truncate_chars(&s, MAX_SUMMARY_CHARS)),
            sentiment: clean(reply.sentiment).map(|s| s.to_lowercase()),
            emotional_tone: clean(reply.emotional_tone).map(|s| s.to_lowercase()),
            themes: normalize_labels(reply.themes, MAX_THEMES),
            tags: normalize_labels(reply.tags, MAX_TAGS),
            is_crisis: reply.is_crisis,
            is_sensitive: reply.is_sensitive,
            relevance_score: reply
                .relevance_score
                .filter(|s| s.is_finite())
                .map(|s| s.clamp(0.0, 1.0)),
        }
    }
}

/// Parse an enrichment reply; malformed replies yield empty metadata.
pub fn parse_enrichment(reply: &str) -> Enrichment {
    parse_reply::<EnrichmentReply>(reply, "enrichment")
        .map(Enrichment::from)
        .unwrap_or_default()
}

fn build_prompt(block: &MemoryBlock) -> String {
    ENRICHMENT_PROMPT
        .replace("{block_type}", block.block_type.as_ref())
        .replace("{source_feature}", &block.source_feature)
        .replace("{content}", &block.content)
}

impl MemoryPipeline {
    /// Job handler for `enrich_and_embed`.
    ///
    /// Writes all enrichment fields and the embedding in one update. Blocks in
    /// `pending_enrichment` or `failed` are processed; `failed` blocks are
    /// retried this way.
    pub async fn enrich_and_embed(
        &self,
        block_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EnrichOutcome, NudgeflowError> {
        let Some(block) = blocks::get(&self.db, block_id).await? else {
            debug!(block_id, "block gone before enrichment");
            return Ok(EnrichOutcome::Missing);
        };
        if block.status == BlockStatus::Active {
            return Ok(EnrichOutcome::AlreadyActive);
        }

        let enrichment = if self.features.enrichment_enabled {
            self.extract_metadata(&block).await
        } else {
            Enrichment::default()
        };

        let embedding = if self.features.embedding_enabled {
            match self.embed_block(&block).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    warn!(block_id, owner = %block.owner, error = %e, "embedding failed, marking block failed");
                    blocks::mark_failed(&self.db, block_id, now).await?;
                    return Err(e);
                }
            }
        } else {
            None
        };
        let embedded = embedding.is_some();

        if !blocks::apply_enrichment(&self.db, block_id, enrichment, embedding, now).await? {
            return Ok(EnrichOutcome::Missing);
        }

        let relation_job = if embedded && !block.exclude_from_memory {
            self.maybe_enqueue_relations(&block, now).await?
        } else {
            None
        };

        info!(block_id, owner = %block.owner, embedded, "memory block enriched");
        self.trace(
            TraceEvent::new("memory.enriched")
                .owner(block.owner.clone())
                .attr("block_id", block.id.clone())
                .attr("embedded", embedded)
                .attr("relation_job", relation_job.is_some()),
        );
        Ok(EnrichOutcome::Enriched { relation_job })
    }

    async fn extract_metadata(&self, block: &MemoryBlock) -> Enrichment {
        let request = CompletionRequest::new(ENRICHMENT_SYSTEM_PROMPT, build_prompt(block))
            .with_max_tokens(400)
            .with_temperature(0.0);
        match self.services.completion.complete(request).await {
            Ok(response) => parse_enrichment(&response.content),
            Err(e) => {
                warn!(block_id = %block.id, error = %e, "enrichment completion failed, continuing without metadata");
                Enrichment::default()
            }
        }
    }

    async fn embed_block(&self, block: &MemoryBlock) -> Result<Vec<f32>, NudgeflowError> {
        let vector = self.services.embedder.embed(&block.content).await?;
        if vector.is_empty() {
            return Err(NudgeflowError::provider("embedding service returned an empty vector"));
        }
        Ok(vector)
    }

    /// Enqueue relation detection only while the owner's hourly quota has room.
    async fn maybe_enqueue_relations(
        &self,
        block: &MemoryBlock,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, NudgeflowError> {
        if !self.features.relation_detection_enabled {
            return Ok(None);
        }
        let used = rate_limits::peek(&self.db, &block.owner, RELATION_BUCKET, hour_window(now)).await?;
        if used >= self.config.relation_quota_per_hour {
            debug!(owner = %block.owner, used, "relation quota exhausted, not enqueueing detection");
            return Ok(None);
        }
        let job = NewJob::new(
            JobType::DetectRelations,
            block.owner.clone(),
            json!({ "block_id": block.id }),
        )
        .max_attempts(self.max_attempts);
        Ok(Some(jobs::enqueue(&self.db, job, now).await?))
    }
}
