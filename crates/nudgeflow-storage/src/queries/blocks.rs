// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory block persistence, similarity search, and user memory controls.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{OptionalExtension, Row, params};

use crate::database::{Database, map_tr_err};
use crate::models::{
    BlockStatus, Enrichment, LedgerOp, MemoryBlock, NewJob, NewMemoryBlock, PrivacyLevel,
    blob_to_vec, cosine_similarity, vec_to_blob,
};
use crate::queries::jobs::insert_job;
use crate::queries::ledger::{NewLedgerEntry, append_in};
use crate::queries::{parse_enum, parse_json, to_json};

const BLOCK_COLUMNS: &str = "id, owner, block_type, source_feature, source_id, content, summary, \
     sentiment, emotional_tone, themes, tags, privacy_level, is_crisis, is_sensitive, \
     exclude_from_memory, relevance_score, embedding, status, retrieval_count, last_retrieved_at, \
     created_at";

/// Predicate for blocks that retrieval and relation detection may see.
const SEARCHABLE: &str = "status = 'active' AND exclude_from_memory = 0";

fn row_to_block(row: &Row<'_>) -> Result<MemoryBlock, rusqlite::Error> {
    let embedding: Option<Vec<u8>> = row.get(16)?;
    Ok(MemoryBlock {
        id: row.get(0)?,
        owner: row.get(1)?,
        block_type: parse_enum(2, row.get(2)?)?,
        source_feature: row.get(3)?,
        source_id: row.get(4)?,
        content: row.get(5)?,
        summary: row.get(6)?,
        sentiment: row.get(7)?,
        emotional_tone: row.get(8)?,
        themes: parse_json(9, row.get(9)?)?,
        tags: parse_json(10, row.get(10)?)?,
        privacy_level: parse_enum(11, row.get(11)?)?,
        is_crisis: row.get(12)?,
        is_sensitive: row.get(13)?,
        exclude_from_memory: row.get(14)?,
        relevance_score: row.get(15)?,
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        status: parse_enum(17, row.get(17)?)?,
        retrieval_count: row.get(18)?,
        last_retrieved_at: row.get(19)?,
        created_at: row.get(20)?,
    })
}

/// Insert a minimal block in `pending_enrichment`, its "create" ledger entry,
/// and its enrichment job, all in one transaction.
///
/// The job row only becomes visible together with the block it refers to.
/// Returns the stored block and the job id.
pub async fn insert_with_job(
    db: &Database,
    block: NewMemoryBlock,
    privacy_level: PrivacyLevel,
    job: impl FnOnce(&str) -> NewJob + Send + 'static,
    now: DateTime<Utc>,
) -> Result<(MemoryBlock, String), NudgeflowError> {
    let now = format_ts(now);
    let id = uuid::Uuid::new_v4().to_string();
    let stored = MemoryBlock {
        id: id.clone(),
        owner: block.owner,
        block_type: block.block_type,
        source_feature: block.source_feature,
        source_id: block.source_id,
        content: block.content,
        summary: None,
        sentiment: None,
        emotional_tone: None,
        themes: Vec::new(),
        tags: Vec::new(),
        privacy_level,
        is_crisis: false,
        is_sensitive: false,
        exclude_from_memory: block.exclude_from_memory,
        relevance_score: 0.5,
        embedding: None,
        status: BlockStatus::PendingEnrichment,
        retrieval_count: 0,
        last_retrieved_at: None,
        created_at: now.clone(),
    };
    let row = stored.clone();

    let job_id = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO memory_blocks (id, owner, block_type, source_feature, source_id, content,
                 privacy_level, exclude_from_memory, relevance_score, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending_enrichment', ?10, ?10)",
                params![
                    row.id,
                    row.owner,
                    row.block_type.as_ref(),
                    row.source_feature,
                    row.source_id,
                    row.content,
                    row.privacy_level.as_ref(),
                    row.exclude_from_memory,
                    row.relevance_score,
                    now,
                ],
            )?;
            append_in(
                &tx,
                &NewLedgerEntry {
                    owner: row.owner.clone(),
                    block_id: row.id.clone(),
                    operation: LedgerOp::Create,
                    actor: "system".to_string(),
                    context: Some(format!("ingested from {}", row.source_feature)),
                    relevance_score: None,
                },
                &now,
            )?;
            let job_id = insert_job(&tx, &job(&row.id), &now)?;
            tx.commit()?;
            Ok(job_id)
        })
        .await
        .map_err(map_tr_err)?;

    Ok((stored, job_id))
}

/// Fetch a block by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<MemoryBlock>, NudgeflowError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM memory_blocks WHERE id = ?1"),
                params![id],
                row_to_block,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Write enrichment results and flip the block to `active` in one update.
pub async fn apply_enrichment(
    db: &Database,
    id: &str,
    enrichment: Enrichment,
    embedding: Option<Vec<f32>>,
    now: DateTime<Utc>,
) -> Result<bool, NudgeflowError> {
    let id = id.to_string();
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE memory_blocks SET summary = ?1, sentiment = ?2, emotional_tone = ?3,
                 themes = ?4, tags = ?5, is_crisis = ?6, is_sensitive = ?7,
                 relevance_score = COALESCE(?8, relevance_score), embedding = ?9,
                 status = 'active', updated_at = ?10
                 WHERE id = ?11",
                params![
                    enrichment.summary,
                    enrichment.sentiment,
                    enrichment.emotional_tone,
                    to_json(&enrichment.themes)?,
                    to_json(&enrichment.tags)?,
                    enrichment.is_crisis,
                    enrichment.is_sensitive,
                    enrichment.relevance_score,
                    embedding.as_deref().map(vec_to_blob),
                    now,
                    id,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Flip a block to `failed`; it is excluded from retrieval and relation detection.
pub async fn mark_failed(db: &Database, id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
    let id = id.to_string();
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE memory_blocks SET status = 'failed', updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Options for [`search`].
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub owner: String,
    pub query_vector: Vec<f32>,
    pub limit: usize,
    pub threshold: f32,
    /// Skip blocks flagged crisis or sensitive.
    pub exclude_crisis: bool,
}

/// Similarity search over the owner's active, non-excluded, embedded blocks.
///
/// Returns up to `limit` `(block, similarity)` pairs at or above `threshold`,
/// most similar first. Brute-force cosine; per-user block counts are small.
pub async fn search(
    db: &Database,
    params: SearchParams,
) -> Result<Vec<(MemoryBlock, f32)>, NudgeflowError> {
    let SearchParams {
        owner,
        query_vector,
        limit,
        threshold,
        exclude_crisis,
    } = params;
    let candidates = db
        .connection()
        .call(move |conn| {
            let crisis_clause = if exclude_crisis {
                " AND is_crisis = 0 AND is_sensitive = 0"
            } else {
                ""
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM memory_blocks
                 WHERE owner = ?1 AND {SEARCHABLE} AND embedding IS NOT NULL{crisis_clause}"
            ))?;
            stmt.query_map(params![owner], row_to_block)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;

    let mut scored: Vec<(MemoryBlock, f32)> = candidates
        .into_iter()
        .filter_map(|block| {
            let sim = block
                .embedding
                .as_deref()
                .map(|e| cosine_similarity(&query_vector, e))?;
            (sim >= threshold).then_some((block, sim))
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    Ok(scored)
}

/// Most recent searchable blocks of `owner`, newest first, excluding `except_id`.
pub async fn recent_searchable(
    db: &Database,
    owner: &str,
    except_id: &str,
    limit: usize,
) -> Result<Vec<MemoryBlock>, NudgeflowError> {
    let owner = owner.to_string();
    let except_id = except_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM memory_blocks
                 WHERE owner = ?1 AND id <> ?2 AND {SEARCHABLE}
                 ORDER BY created_at DESC, rowid DESC LIMIT ?3"
            ))?;
            stmt.query_map(params![owner, except_id, limit as i64], row_to_block)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Searchable blocks of `owner` created at or after `since`, newest first.
pub async fn searchable_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<MemoryBlock>, NudgeflowError> {
    let owner = owner.to_string();
    let since = format_ts(since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BLOCK_COLUMNS} FROM memory_blocks
                 WHERE owner = ?1 AND created_at >= ?2 AND {SEARCHABLE}
                 ORDER BY created_at DESC LIMIT ?3"
            ))?;
            stmt.query_map(params![owner, since, limit as i64], row_to_block)?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Theme lists of non-excluded blocks created at or after `since`.
pub async fn themes_since(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Vec<String>>, NudgeflowError> {
    let owner = owner.to_string();
    let since = format_ts(since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT themes FROM memory_blocks
                 WHERE owner = ?1 AND created_at >= ?2 AND exclude_from_memory = 0",
            )?;
            stmt.query_map(params![owner, since], |row| parse_json(0, row.get(0)?))?
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Log a "retrieve" ledger entry and bump the block's retrieval counter.
pub async fn record_retrieval(
    db: &Database,
    owner: &str,
    block_id: &str,
    actor: &str,
    similarity: f32,
    now: DateTime<Utc>,
) -> Result<(), NudgeflowError> {
    let entry = NewLedgerEntry {
        owner: owner.to_string(),
        block_id: block_id.to_string(),
        operation: LedgerOp::Retrieve,
        actor: actor.to_string(),
        context: None,
        relevance_score: Some(similarity),
    };
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE memory_blocks SET retrieval_count = retrieval_count + 1,
                 last_retrieved_at = ?1 WHERE id = ?2 AND owner = ?3",
                params![now, entry.block_id, entry.owner],
            )?;
            append_in(&tx, &entry, &now)?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Who performed a user memory control and why.
#[derive(Debug, Clone)]
pub struct ControlAction {
    pub owner: String,
    pub block_id: String,
    pub actor: String,
    pub reason: Option<String>,
}

async fn controlled_update(
    db: &Database,
    action: ControlAction,
    operation: LedgerOp,
    sql: &'static str,
    now: DateTime<Utc>,
    extra: Option<String>,
) -> Result<(), NudgeflowError> {
    let now = format_ts(now);
    let block_id = action.block_id.clone();
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let changed = match &extra {
                Some(value) => tx.execute(sql, params![action.block_id, action.owner, now, value])?,
                None => tx.execute(sql, params![action.block_id, action.owner, now])?,
            };
            if changed == 0 {
                return Ok(false);
            }
            append_in(
                &tx,
                &NewLedgerEntry {
                    owner: action.owner,
                    block_id: action.block_id,
                    operation,
                    actor: action.actor,
                    context: action.reason,
                    relevance_score: None,
                },
                &now,
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if found {
        Ok(())
    } else {
        Err(NudgeflowError::not_found("memory block", block_id))
    }
}

/// Exclude a block from all future retrieval and relation detection.
pub async fn exclude(db: &Database, action: ControlAction, now: DateTime<Utc>) -> Result<(), NudgeflowError> {
    controlled_update(
        db,
        action,
        LedgerOp::Exclude,
        "UPDATE memory_blocks SET exclude_from_memory = 1, updated_at = ?3
         WHERE id = ?1 AND owner = ?2",
        now,
        None,
    )
    .await
}

/// Delete a block. Its relations go with it; its ledger history stays.
pub async fn delete(db: &Database, action: ControlAction, now: DateTime<Utc>) -> Result<(), NudgeflowError> {
    controlled_update(
        db,
        action,
        LedgerOp::Delete,
        "DELETE FROM memory_blocks WHERE id = ?1 AND owner = ?2 AND ?3 IS NOT NULL",
        now,
        None,
    )
    .await
}

/// Change a block's privacy level on explicit user request.
pub async fn set_privacy(
    db: &Database,
    action: ControlAction,
    level: PrivacyLevel,
    now: DateTime<Utc>,
) -> Result<(), NudgeflowError> {
    controlled_update(
        db,
        action,
        LedgerOp::ChangePrivacy,
        "UPDATE memory_blocks SET privacy_level = ?4, updated_at = ?3
         WHERE id = ?1 AND owner = ?2",
        now,
        Some(level.as_ref().to_string()),
    )
    .await
}
