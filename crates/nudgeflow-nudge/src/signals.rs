// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded behavioral lookups the rule packs need beyond the context summary.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use nudgeflow_config::NudgeConfig;
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::parse_ts;
use nudgeflow_storage::queries::behavior;
use nudgeflow_storage::{Database, GoalStatus};

const RECENT_FEATURE_DAYS: i64 = 7;
const FEATURE_LOOKBACK_DAYS: i64 = 30;
const NEW_GOAL_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCompletion {
    pub tool_name: String,
    pub completed_at: DateTime<Utc>,
}

/// An active goal nobody has touched for a long time.
#[derive(Debug, Clone, PartialEq)]
pub struct StaleGoal {
    pub id: String,
    pub title: String,
    pub days_inactive: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorSignals {
    pub last_tool_completion: Option<ToolCompletion>,
    /// Active goals inactive for at least the abandonment threshold.
    pub stale_goals: Vec<StaleGoal>,
    /// Goals created in the last 14 days with no completed action.
    pub new_goals_without_completions: u64,
    /// Features used in the last 7 days.
    pub recent_features: Vec<String>,
    /// Features used in the last 30 days but not the last 7.
    pub lapsed_features: Vec<String>,
}

fn degrade<T: Default>(part: &str, owner: &str, result: Result<T, NudgeflowError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(owner, part, error = %e, "behavior lookup failed, using default");
        T::default()
    })
}

/// Run every lookup concurrently. Failed lookups fall back to empty values.
pub async fn gather(
    db: &Database,
    owner: &str,
    config: &NudgeConfig,
    now: DateTime<Utc>,
) -> BehaviorSignals {
    let (tool, stale, new_goals, features) = tokio::join!(
        last_tool_completion(db, owner),
        stale_goals(db, owner, config.abandoned_goal_days, now),
        behavior::goals_without_completions_since(db, owner, now - Duration::days(NEW_GOAL_DAYS)),
        feature_usage(db, owner, now),
    );
    let (recent_features, lapsed_features) = degrade("feature_usage", owner, features);
    BehaviorSignals {
        last_tool_completion: degrade("last_tool_completion", owner, tool),
        stale_goals: degrade("stale_goals", owner, stale),
        new_goals_without_completions: degrade("new_goals", owner, new_goals),
        recent_features,
        lapsed_features,
    }
}

async fn last_tool_completion(db: &Database, owner: &str) -> Result<Option<ToolCompletion>, NudgeflowError> {
    Ok(behavior::last_tool_completion(db, owner)
        .await?
        .and_then(|(tool_name, at)| {
            parse_ts(&at).map(|completed_at| ToolCompletion {
                tool_name,
                completed_at,
            })
        }))
}

async fn stale_goals(
    db: &Database,
    owner: &str,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<StaleGoal>, NudgeflowError> {
    let goals = behavior::goals_with_status(db, owner, GoalStatus::Active).await?;
    Ok(goals
        .into_iter()
        .filter_map(|g| {
            let last = g.last_activity_at.as_deref().unwrap_or(&g.created_at);
            let days_inactive = (now - parse_ts(last)?).num_days();
            (days_inactive >= threshold_days).then_some(StaleGoal {
                id: g.id,
                title: g.title,
                days_inactive,
            })
        })
        .collect())
}

async fn feature_usage(
    db: &Database,
    owner: &str,
    now: DateTime<Utc>,
) -> Result<(Vec<String>, Vec<String>), NudgeflowError> {
    let recent = behavior::feature_usage_since(db, owner, now - Duration::days(RECENT_FEATURE_DAYS)).await?;
    let lookback =
        behavior::feature_usage_since(db, owner, now - Duration::days(FEATURE_LOOKBACK_DAYS)).await?;
    let recent: Vec<String> = recent.into_iter().map(|(f, _)| f).collect();
    let lapsed = lookback
        .into_iter()
        .map(|(f, _)| f)
        .filter(|f| !recent.contains(f))
        .collect();
    Ok((recent, lapsed))
}
