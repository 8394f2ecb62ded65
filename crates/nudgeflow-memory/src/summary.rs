// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weekly summary job handler.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::CompletionRequest;
use nudgeflow_storage::queries::blocks;
use nudgeflow_storage::{BlockType, MemoryBlock, NewMemoryBlock};

use crate::MemoryPipeline;
use crate::parse::truncate_chars;

/// Source feature tag of generated summaries.
pub const WEEKLY_SUMMARY_FEATURE: &str = "weekly_summary";

const MAX_ENTRIES: usize = 50;

const SUMMARY_SYSTEM_PROMPT: &str = "You write short, warm weekly reflections for a personal \
coaching app. Plain text, second person, no lists, no crisis advice.";

impl MemoryPipeline {
    /// Summarise the owner's last seven days of memory into an `insight` block.
    ///
    /// The insight goes through normal ingestion, so it is enriched and
    /// embedded like any other block. Returns `None` when there is nothing to
    /// summarise, the model returns nothing, or memory is off for the owner.
    /// Completion failures propagate so the job is retried.
    pub async fn weekly_summary(
        &self,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<MemoryBlock>, NudgeflowError> {
        if !self.features.memory_enabled {
            return Ok(None);
        }
        let recent = blocks::searchable_since(&self.db, owner, now - Duration::days(7), MAX_ENTRIES)
            .await?
            .into_iter()
            .filter(|b| b.source_feature != WEEKLY_SUMMARY_FEATURE && !b.is_crisis)
            .collect::<Vec<_>>();
        if recent.is_empty() {
            debug!(owner, "nothing to summarise this week");
            return Ok(None);
        }

        let entries = recent
            .iter()
            .rev()
            .map(|b| {
                let text = b.summary.as_deref().unwrap_or(&b.content);
                let day = b.created_at.get(..10).unwrap_or(&b.created_at);
                format!("- {day} [{}] {}", b.source_feature, truncate_chars(text, 300))
            })
            .collect::<Vec<_>>()
            .join("\n");
        let request = CompletionRequest::new(
            SUMMARY_SYSTEM_PROMPT,
            format!("Write a reflection of at most 4 sentences on this week's entries:\n{entries}"),
        )
        .with_max_tokens(300);
        let response = self.services.completion.complete(request).await?;
        let text = response.content.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let block = NewMemoryBlock::new(owner, BlockType::Insight, WEEKLY_SUMMARY_FEATURE, text)
            .source_id(format!("week-ending-{}", now.format("%Y-%m-%d")));
        let stored = self.ingest_minimal(block, now).await?;
        if let Some(block) = &stored {
            info!(owner, block_id = %block.id, entries = recent.len(), "weekly summary stored");
        }
        Ok(stored)
    }
}
