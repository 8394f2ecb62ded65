// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers that put a fresh database into a known state.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use nudgeflow_storage::queries::{behavior, blocks};
use nudgeflow_storage::{
    BlockType, Database, Enrichment, Goal, GoalStatus, JobType, MemoryBlock, NewJob,
    NewMemoryBlock, PrivacyLevel,
};

use crate::mock_embedder::MockEmbedder;

/// In-memory database with all migrations applied.
pub async fn test_db() -> Database {
    match Database::open_in_memory().await {
        Ok(db) => db,
        Err(e) => panic!("in-memory database failed to open: {e}"),
    }
}

/// Insert mood check-ins one `step` apart, the last one at `last_at`.
/// `values` are oldest first.
pub async fn moods(
    db: &Database,
    owner: &str,
    values: &[f64],
    last_at: DateTime<Utc>,
    step: Duration,
) -> Result<(), NudgeflowError> {
    let n = values.len() as i32;
    for (i, mood) in values.iter().enumerate() {
        let at = last_at - step * (n - 1 - i as i32);
        behavior::insert_mood(db, owner, *mood, None, at).await?;
    }
    Ok(())
}

/// Insert an active goal with the given progress and creation time.
pub async fn active_goal(
    db: &Database,
    owner: &str,
    title: &str,
    progress: f64,
    created_at: DateTime<Utc>,
) -> Result<String, NudgeflowError> {
    let id = uuid::Uuid::new_v4().to_string();
    behavior::insert_goal(
        db,
        Goal {
            id: id.clone(),
            owner: owner.to_string(),
            title: title.to_string(),
            status: GoalStatus::Active,
            progress,
            created_at: format_ts(created_at),
            last_activity_at: None,
        },
    )
    .await?;
    Ok(id)
}

/// Add an action to `goal_id`, completing it at `completed_at` when given.
pub async fn goal_action(
    db: &Database,
    owner: &str,
    goal_id: &str,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
) -> Result<String, NudgeflowError> {
    let id = behavior::insert_goal_action(db, owner, goal_id, "step", created_at).await?;
    if let Some(at) = completed_at {
        behavior::complete_goal_action(db, &id, at).await?;
    }
    Ok(id)
}

/// Insert an already-enriched, active block embedded with [`MockEmbedder`].
///
/// The enrichment job created alongside it stays pending.
pub async fn active_block(
    db: &Database,
    owner: &str,
    feature: &str,
    content: &str,
    themes: &[&str],
    at: DateTime<Utc>,
) -> Result<MemoryBlock, NudgeflowError> {
    let block = NewMemoryBlock::new(owner, BlockType::JournalEntry, feature, content);
    let job_owner = owner.to_string();
    let (stored, _) = blocks::insert_with_job(
        db,
        block,
        PrivacyLevel::Private,
        move |id| NewJob::new(JobType::EnrichAndEmbed, job_owner, json!({ "block_id": id })),
        at,
    )
    .await?;
    let enrichment = Enrichment {
        summary: Some(content.chars().take(80).collect()),
        themes: themes.iter().map(|t| t.to_string()).collect(),
        ..Enrichment::default()
    };
    blocks::apply_enrichment(
        db,
        &stored.id,
        enrichment,
        Some(MockEmbedder::vector_for(content)),
        at,
    )
    .await?;
    blocks::get(db, &stored.id)
        .await?
        .ok_or_else(|| NudgeflowError::not_found("memory block", stored.id))
}
