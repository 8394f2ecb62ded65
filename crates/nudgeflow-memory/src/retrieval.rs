// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retrieval and synthesis of contextual memory.
//!
//! Flow on a cache miss: embed the query, similarity-search the owner's
//! active blocks, log each hit through the event writer, then make one
//! completion call to condense the hits into a [`SynthesizedContext`]. When
//! nothing matches, the empty context is returned without calling the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::{CompletionRequest, TraceEvent};
use nudgeflow_storage::MemoryBlock;
use nudgeflow_storage::queries::blocks::{self, SearchParams};

use crate::MemoryPipeline;
use crate::parse::{normalize_labels, parse_reply, truncate_chars};

/// Tone used when nothing better is known.
pub const DEFAULT_TONE: &str = "supportive";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You prepare background notes for a supportive personal \
coach. Reply with a single JSON object and nothing else.";

const SYNTHESIS_PROMPT: &str = r#"From the user's past entries below, write background for the coach's next reply in "{feature}" about: {query}

Reply with JSON:
{
  "context_bullets": up to 5 short factual bullets the coach should keep in mind,
  "suggested_tone": one or two words, e.g. "supportive", "encouraging", "gentle",
  "key_themes": up to 5 short lowercase themes
}

Entries:
{entries}"#;

/// Parameters for [`MemoryPipeline::retrieve`].
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub owner: String,
    pub query: String,
    /// Feature the context is for, part of the cache key.
    pub target_feature: String,
    /// Defaults to `memory.retrieval_limit`.
    pub limit: Option<usize>,
    /// Defaults to `memory.similarity_threshold`.
    pub threshold: Option<f32>,
    pub exclude_crisis: bool,
}

impl RetrievalQuery {
    pub fn new(owner: impl Into<String>, query: impl Into<String>, target_feature: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            query: query.into(),
            target_feature: target_feature.into(),
            limit: None,
            threshold: None,
            exclude_crisis: true,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn include_crisis(mut self) -> Self {
        self.exclude_crisis = false;
        self
    }
}

/// Compact memory context handed to downstream prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedContext {
    pub context_bullets: Vec<String>,
    pub suggested_tone: String,
    pub key_themes: Vec<String>,
    /// Blocks the context was built from, most similar first.
    pub source_block_ids: Vec<String>,
}

impl SynthesizedContext {
    /// The context used when no memory applies.
    pub fn empty() -> Self {
        Self {
            context_bullets: Vec::new(),
            suggested_tone: DEFAULT_TONE.to_string(),
            key_themes: Vec::new(),
            source_block_ids: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context_bullets.is_empty() && self.source_block_ids.is_empty()
    }
}

impl Default for SynthesizedContext {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SynthesisReply {
    context_bullets: Vec<String>,
    suggested_tone: String,
    key_themes: Vec<String>,
}

impl Default for SynthesisReply {
    fn default() -> Self {
        Self {
            context_bullets: Vec::new(),
            suggested_tone: DEFAULT_TONE.to_string(),
            key_themes: Vec::new(),
        }
    }
}

/// Lowercase and collapse whitespace so trivially different queries share a key.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key for one owner, feature, and query.
pub fn cache_key(owner: &str, target_feature: &str, query: &str) -> String {
    let digest = Sha256::digest(normalize_query(query).as_bytes());
    format!("ctx:{owner}:{target_feature}:{}", hex::encode(digest))
}

/// Pattern matching every cached context of `owner`.
pub fn owner_pattern(owner: &str) -> String {
    format!("ctx:{owner}:*")
}

fn build_prompt(query: &RetrievalQuery, hits: &[(MemoryBlock, f32)]) -> String {
    let entries = hits
        .iter()
        .map(|(block, _)| {
            let text = block.summary.as_deref().unwrap_or(&block.content);
            format!("- [{}] {}", block.source_feature, truncate_chars(text, 400))
        })
        .collect::<Vec<_>>()
        .join("\n");
    SYNTHESIS_PROMPT
        .replace("{feature}", &query.target_feature)
        .replace("{query}", &query.query)
        .replace("{entries}", &entries)
}

impl MemoryPipeline {
    /// Retrieve and synthesize memory context for a query.
    ///
    /// Any failure yields [`SynthesizedContext::empty`] unless fail-fast is
    /// configured, in which case the error is returned.
    pub async fn retrieve(
        &self,
        query: RetrievalQuery,
        now: DateTime<Utc>,
    ) -> Result<SynthesizedContext, NudgeflowError> {
        if !self.features.memory_enabled || !self.features.embedding_enabled {
            return Ok(SynthesizedContext::empty());
        }
        match self.try_retrieve(&query, now).await {
            Ok(context) => Ok(context),
            Err(e) if self.features.fail_fast => Err(e),
            Err(e) => {
                warn!(owner = %query.owner, error = %e, "retrieval failed, using empty context");
                Ok(SynthesizedContext::empty())
            }
        }
    }

    async fn try_retrieve(
        &self,
        query: &RetrievalQuery,
        now: DateTime<Utc>,
    ) -> Result<SynthesizedContext, NudgeflowError> {
        let key = cache_key(&query.owner, &query.target_feature, &query.query);
        if let Some(hit) = self.cached(&key).await {
            metrics::counter!("nudgeflow_context_cache_hits_total").increment(1);
            return Ok(hit);
        }
        metrics::counter!("nudgeflow_context_cache_misses_total").increment(1);

        let vector = self.services.embedder.embed(&query.query).await?;
        let hits = blocks::search(
            &self.db,
            SearchParams {
                owner: query.owner.clone(),
                query_vector: vector,
                limit: query.limit.unwrap_or(self.config.retrieval_limit),
                threshold: query.threshold.unwrap_or(self.config.similarity_threshold),
                exclude_crisis: query.exclude_crisis,
            },
        )
        .await?;

        let actor = format!("retrieval:{}", query.target_feature);
        for (block, similarity) in &hits {
            self.events.retrieved(&query.owner, &block.id, &actor, *similarity, now);
        }
        self.trace(
            TraceEvent::new("memory.retrieved")
                .owner(query.owner.clone())
                .attr("target_feature", query.target_feature.clone())
                .attr("hits", hits.len()),
        );

        if hits.is_empty() {
            return Ok(SynthesizedContext::empty());
        }

        let top = &hits[..hits.len().min(self.config.synthesis_blocks.max(1))];
        let request = CompletionRequest::new(SYNTHESIS_SYSTEM_PROMPT, build_prompt(query, top))
            .with_max_tokens(400)
            .with_temperature(0.2);
        let response = self.services.completion.complete(request).await?;
        let source_block_ids = hits.iter().map(|(b, _)| b.id.clone()).collect();

        let Some(reply) = parse_reply::<SynthesisReply>(&response.content, "synthesis") else {
            return Ok(SynthesizedContext {
                source_block_ids,
                ..SynthesizedContext::empty()
            });
        };
        let tone = reply.suggested_tone.trim().to_lowercase();
        let context = SynthesizedContext {
            context_bullets: reply
                .context_bullets
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .take(5)
                .collect(),
            suggested_tone: if tone.is_empty() { DEFAULT_TONE.to_string() } else { tone },
            key_themes: normalize_labels(reply.key_themes, 5),
            source_block_ids,
        };
        self.store_cached(&key, &context).await;
        Ok(context)
    }

    async fn cached(&self, key: &str) -> Option<SynthesizedContext> {
        match self.services.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(context) => Some(context),
                Err(e) => {
                    debug!(key, error = %e, "discarding undecodable cached context");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn store_cached(&self, key: &str, context: &SynthesizedContext) {
        let raw = match serde_json::to_string(context) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(key, error = %e, "could not encode context for cache");
                return;
            }
        };
        if let Err(e) = self.services.cache.set(key, raw, self.config.cache_ttl()).await {
            warn!(key, error = %e, "cache write failed");
        }
    }
}
