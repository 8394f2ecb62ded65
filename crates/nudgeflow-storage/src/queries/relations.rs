// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed relations between memory blocks.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::{MemoryRelation, RelationType};
use crate::queries::parse_enum;

/// Persist a relation. Both blocks must exist and share `owner`; self-loops
/// are rejected. A duplicate (source, target, type) keeps the stronger edge.
pub async fn insert(
    db: &Database,
    owner: &str,
    source_block_id: &str,
    target_block_id: &str,
    relation_type: RelationType,
    strength: f32,
    now: DateTime<Utc>,
) -> Result<MemoryRelation, NudgeflowError> {
    if source_block_id == target_block_id {
        return Err(NudgeflowError::InvalidArgument(
            "a block cannot relate to itself".to_string(),
        ));
    }
    let relation = MemoryRelation {
        id: uuid::Uuid::new_v4().to_string(),
        owner: owner.to_string(),
        source_block_id: source_block_id.to_string(),
        target_block_id: target_block_id.to_string(),
        relation_type,
        strength: strength.clamp(0.0, 1.0),
        auto_generated: true,
        created_at: format_ts(now),
    };
    let row = relation.clone();

    let owned = db
        .connection()
        .call(move |conn| {
            let same_owner: i64 = conn.query_row(
                "SELECT COUNT(*) FROM memory_blocks WHERE id IN (?1, ?2) AND owner = ?3",
                params![row.source_block_id, row.target_block_id, row.owner],
                |r| r.get(0),
            )?;
            if same_owner != 2 {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO memory_relations (id, owner, source_block_id, target_block_id,
                 relation_type, strength, auto_generated, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (source_block_id, target_block_id, relation_type)
                 DO UPDATE SET strength = MAX(strength, excluded.strength)",
                params![
                    row.id,
                    row.owner,
                    row.source_block_id,
                    row.target_block_id,
                    row.relation_type.as_ref(),
                    row.strength,
                    row.auto_generated,
                    row.created_at,
                ],
            )?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if owned {
        Ok(relation)
    } else {
        Err(NudgeflowError::InvalidArgument(format!(
            "blocks {source_block_id} and {target_block_id} do not both belong to {owner}"
        )))
    }
}

/// Relations touching `block_id`, in either direction.
pub async fn for_block(db: &Database, block_id: &str) -> Result<Vec<MemoryRelation>, NudgeflowError> {
    let block_id = block_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, owner, source_block_id, target_block_id, relation_type, strength,
                 auto_generated, created_at
                 FROM memory_relations WHERE source_block_id = ?1 OR target_block_id = ?1
                 ORDER BY created_at ASC",
            )?;
            stmt.query_map(params![block_id], |row| {
                Ok(MemoryRelation {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    source_block_id: row.get(2)?,
                    target_block_id: row.get(3)?,
                    relation_type: parse_enum(4, row.get(4)?)?,
                    strength: row.get(5)?,
                    auto_generated: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// A recent relation with the source features of both endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConnection {
    pub source_feature: String,
    pub target_feature: String,
    pub relation_type: RelationType,
}

/// Relations created at or after `since`, newest first, joined to their blocks' features.
///
/// Relations touching excluded blocks are omitted.
pub async fn recent_connections(
    db: &Database,
    owner: &str,
    since: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<FeatureConnection>, NudgeflowError> {
    let owner = owner.to_string();
    let since = format_ts(since);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.source_feature, t.source_feature, r.relation_type
                 FROM memory_relations r
                 JOIN memory_blocks s ON s.id = r.source_block_id
                 JOIN memory_blocks t ON t.id = r.target_block_id
                 WHERE r.owner = ?1 AND r.created_at >= ?2
                   AND s.exclude_from_memory = 0 AND t.exclude_from_memory = 0
                 ORDER BY r.created_at DESC LIMIT ?3",
            )?;
            stmt.query_map(params![owner, since, limit as i64], |row| {
                Ok(FeatureConnection {
                    source_feature: row.get(0)?,
                    target_feature: row.get(1)?,
                    relation_type: parse_enum(2, row.get(2)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::models::{BlockType, JobType, NewJob, NewMemoryBlock, PrivacyLevel};
    use crate::queries::blocks;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    async fn block(db: &Database, owner: &'static str, feature: &str) -> String {
        blocks::insert_with_job(
            db,
            NewMemoryBlock::new(owner, BlockType::Message, feature, "text"),
            PrivacyLevel::Private,
            move |id: &str| NewJob::new(JobType::EnrichAndEmbed, owner, json!({ "block_id": id })),
            t0(),
        )
        .await
        .unwrap()
        .0
        .id
    }

    #[tokio::test]
    async fn rejects_self_loops_and_cross_owner_edges() {
        let db = Database::open_in_memory().await.unwrap();
        let a = block(&db, "u1", "journal").await;
        let b = block(&db, "u2", "chat").await;

        assert!(insert(&db, "u1", &a, &a, RelationType::Supports, 0.9, t0()).await.is_err());
        assert!(insert(&db, "u1", &a, &b, RelationType::Supports, 0.9, t0()).await.is_err());
        assert!(for_block(&db, &a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_edges_keep_the_stronger_strength() {
        let db = Database::open_in_memory().await.unwrap();
        let a = block(&db, "u1", "journal").await;
        let b = block(&db, "u1", "tools").await;

        insert(&db, "u1", &a, &b, RelationType::FollowsUpOn, 0.6, t0()).await.unwrap();
        insert(&db, "u1", &a, &b, RelationType::FollowsUpOn, 0.8, t0()).await.unwrap();
        insert(&db, "u1", &a, &b, RelationType::FollowsUpOn, 0.7, t0()).await.unwrap();

        let relations = for_block(&db, &b).await.unwrap();
        assert_eq!(relations.len(), 1);
        assert!((relations[0].strength - 0.8).abs() < 1e-6);

        let connections = recent_connections(&db, "u1", t0(), 10).await.unwrap();
        assert_eq!(
            connections,
            vec![FeatureConnection {
                source_feature: "journal".into(),
                target_feature: "tools".into(),
                relation_type: RelationType::FollowsUpOn,
            }]
        );
    }
}
