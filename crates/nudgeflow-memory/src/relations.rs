// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited relation detection.
//!
//! Each run compares one block against a bounded window of the owner's recent
//! searchable blocks. Comparisons are independent: they fan out with bounded
//! concurrency, each is retried on its own, and every positive result is
//! persisted as soon as it is known. Partial success is normal.

use chrono::{DateTime, Timelike, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::{CompletionRequest, TraceEvent};
use nudgeflow_storage::queries::{blocks, rate_limits, relations};
use nudgeflow_storage::{BlockStatus, MemoryBlock, RelationType};

use crate::MemoryPipeline;
use crate::parse::{parse_reply, truncate_chars};

/// Rate-limit bucket for relation detection runs.
pub const RELATION_BUCKET: &str = "relation_detection";

/// Attempts per comparison before it is counted as failed.
const COMPARISON_ATTEMPTS: u32 = 2;

const RELATION_SYSTEM_PROMPT: &str = "You compare two entries from the same person's coaching \
journal. Reply with a single JSON object and nothing else.";

const RELATION_PROMPT: &str = r#"Is entry A related to entry B? Reply with JSON:
{
  "related": true | false,
  "relation_type": one of "supports", "addresses", "follows_up_on", "derived_from",
                   "connected_to", "contradicts", "reinforces",
  "strength": 0.0 to 1.0
}

Entry A ({a_feature}): {a_text}

Entry B ({b_feature}): {b_text}"#;

/// Start of the hourly quota window containing `now`.
pub fn hour_window(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// What a relation detection run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationOutcome {
    /// Relation detection is switched off.
    Disabled,
    /// The block is missing, excluded, or not active.
    Skipped,
    /// The owner's hourly quota was already used up.
    QuotaExceeded,
    Detected {
        compared: usize,
        created: usize,
        failed: usize,
    },
}

#[derive(Debug, Deserialize)]
struct RelationReply {
    #[serde(default)]
    related: bool,
    relation_type: Option<String>,
    #[serde(default)]
    strength: f32,
}

/// A relation the model proposed, if it is usable.
fn parse_relation(reply: &str) -> Option<(RelationType, f32)> {
    let reply: RelationReply = parse_reply(reply, "relation")?;
    if !reply.related || !reply.strength.is_finite() {
        return None;
    }
    let relation_type = reply
        .relation_type?
        .trim()
        .replace(['-', ' '], "_")
        .parse::<RelationType>()
        .ok()?;
    Some((relation_type, reply.strength.clamp(0.0, 1.0)))
}

enum Comparison {
    Created,
    None,
    Failed,
}

impl MemoryPipeline {
    /// Job handler for `detect_relations`.
    ///
    /// Consumes one unit of the owner's hourly quota before doing anything
    /// else; over quota the run is a no-op.
    pub async fn detect_relations(
        &self,
        block_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RelationOutcome, NudgeflowError> {
        if !self.features.relation_detection_enabled {
            return Ok(RelationOutcome::Disabled);
        }
        let block = match blocks::get(&self.db, block_id).await? {
            Some(b) if b.status == BlockStatus::Active && !b.exclude_from_memory => b,
            _ => return Ok(RelationOutcome::Skipped),
        };

        let allowed = rate_limits::try_consume(
            &self.db,
            &block.owner,
            RELATION_BUCKET,
            hour_window(now),
            self.config.relation_quota_per_hour,
        )
        .await?;
        if !allowed {
            debug!(owner = %block.owner, block_id, "relation quota exceeded, skipping detection");
            metrics::counter!("nudgeflow_relation_quota_exceeded_total").increment(1);
            return Ok(RelationOutcome::QuotaExceeded);
        }

        let candidates =
            blocks::recent_searchable(&self.db, &block.owner, block_id, self.config.relation_window)
                .await?;
        let compared = candidates.len();

        let results: Vec<Comparison> = futures::stream::iter(candidates)
            .map(|candidate| self.compare(&block, candidate, now))
            .buffer_unordered(self.config.relation_concurrency.max(1))
            .collect()
            .await;

        let created = results.iter().filter(|r| matches!(r, Comparison::Created)).count();
        let failed = results.iter().filter(|r| matches!(r, Comparison::Failed)).count();

        info!(owner = %block.owner, block_id, compared, created, failed, "relation detection finished");
        self.trace(
            TraceEvent::new("memory.relations_detected")
                .owner(block.owner.clone())
                .attr("block_id", block.id.clone())
                .attr("compared", compared)
                .attr("created", created)
                .attr("failed", failed),
        );
        Ok(RelationOutcome::Detected {
            compared,
            created,
            failed,
        })
    }

    async fn compare(&self, block: &MemoryBlock, candidate: MemoryBlock, now: DateTime<Utc>) -> Comparison {
        let prompt = RELATION_PROMPT
            .replace("{a_feature}", &block.source_feature)
            .replace("{a_text}", &truncate_chars(block.summary.as_deref().unwrap_or(&block.content), 600))
            .replace("{b_feature}", &candidate.source_feature)
            .replace(
                "{b_text}",
                &truncate_chars(candidate.summary.as_deref().unwrap_or(&candidate.content), 600),
            );

        let mut reply = None;
        for attempt in 1..=COMPARISON_ATTEMPTS {
            let request = CompletionRequest::new(RELATION_SYSTEM_PROMPT, prompt.clone())
                .with_max_tokens(100)
                .with_temperature(0.0);
            match self.services.completion.complete(request).await {
                Ok(response) => {
                    reply = Some(response.content);
                    break;
                }
                Err(e) => {
                    debug!(candidate = %candidate.id, attempt, error = %e, "relation comparison failed");
                }
            }
        }
        let Some(reply) = reply else {
            warn!(block_id = %block.id, candidate = %candidate.id, "relation comparison gave up");
            return Comparison::Failed;
        };

        let Some((relation_type, strength)) = parse_relation(&reply) else {
            return Comparison::None;
        };
        if strength < self.config.relation_min_strength {
            return Comparison::None;
        }

        match relations::insert(
            &self.db,
            &block.owner,
            &block.id,
            &candidate.id,
            relation_type,
            strength,
            now,
        )
        .await
        {
            Ok(_) => Comparison::Created,
            Err(e) => {
                warn!(block_id = %block.id, candidate = %candidate.id, error = %e, "failed to store relation");
                Comparison::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn window_truncates_to_hour() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 41, 17).unwrap();
        assert_eq!(hour_window(now), Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn relation_reply_variants() {
        assert_eq!(
            parse_relation(r#"{"related": true, "relation_type": "follows-up-on", "strength": 0.8}"#),
            Some((RelationType::FollowsUpOn, 0.8))
        );
        assert_eq!(
            parse_relation(r#"{"related": true, "relation_type": "Reinforces", "strength": 3}"#),
            Some((RelationType::Reinforces, 1.0))
        );
        assert_eq!(parse_relation(r#"{"related": false, "relation_type": "supports"}"#), None);
        assert_eq!(
            parse_relation(r#"{"related": true, "relation_type": "befriends", "strength": 0.9}"#),
            None
        );
        assert_eq!(parse_relation("no idea"), None);
    }
}
