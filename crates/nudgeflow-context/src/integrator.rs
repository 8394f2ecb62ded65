// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent assembly of the context summary.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::{format_ts, parse_ts};
use nudgeflow_storage::queries::{behavior, blocks, relations, settings};
use nudgeflow_storage::{Database, GoalStatus, UserProfile};

use crate::signals::{
    RiskInputs, activity_dates, assess_risks, classify_trend, mean, rank_themes, streaks,
};
use crate::types::{ActiveGoal, ContextSummary, Momentum, MoodSummary, RiskFlag};

const THEME_DAYS: i64 = 7;
const THEME_LIMIT: usize = 5;
const MOOD_WINDOW_DAYS: i64 = 14;
const STREAK_LOOKBACK_DAYS: i64 = 90;
const CONNECTION_DAYS: i64 = 7;
const CONNECTION_LIMIT: usize = 10;

/// Builds [`ContextSummary`] values from the store.
#[derive(Clone)]
pub struct ContextIntegrator {
    db: Database,
}

/// Log a failed part and fall back to its default.
fn degrade<T>(part: &str, owner: &str, result: Result<T, NudgeflowError>, default: impl FnOnce() -> T) -> T {
    result.unwrap_or_else(|e| {
        warn!(owner, part, error = %e, "context part failed, using default");
        default()
    })
}

impl ContextIntegrator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Build the summary for `owner` as of `now`.
    ///
    /// The seven parts are computed concurrently; a failing part degrades to
    /// its default instead of failing the summary.
    pub async fn build_summary(&self, owner: &str, now: DateTime<Utc>) -> ContextSummary {
        let (themes, risks, momentum, active_goal, mood, profile, connections) = tokio::join!(
            self.themes(owner, now),
            self.risks(owner, now),
            self.momentum(owner, now),
            self.active_goal(owner),
            self.mood(owner, now),
            self.profile(owner),
            self.connections(owner, now),
        );

        let summary = ContextSummary {
            owner: owner.to_string(),
            generated_at: format_ts(now),
            themes: degrade("themes", owner, themes, Vec::new),
            risks: degrade("risks", owner, risks, Vec::new),
            momentum: degrade("momentum", owner, momentum, Momentum::default),
            active_goal: degrade("active_goal", owner, active_goal, || None),
            mood: degrade("mood", owner, mood, MoodSummary::default),
            profile: degrade("profile", owner, profile, || UserProfile::defaults_for(owner)),
            connections: degrade("connections", owner, connections, Vec::new),
        };
        debug!(
            owner,
            themes = summary.themes.len(),
            risks = summary.risks.len(),
            streak = summary.momentum.streak_days,
            trend = %summary.mood.trend,
            "context summary built"
        );
        summary
    }

    async fn themes(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<String>, NudgeflowError> {
        let lists = blocks::themes_since(&self.db, owner, now - Duration::days(THEME_DAYS)).await?;
        Ok(rank_themes(lists, THEME_LIMIT))
    }

    async fn risks(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<RiskFlag>, NudgeflowError> {
        let last_journal_at = behavior::last_journal_at(&self.db, owner).await?;
        let latest_moods = behavior::latest_moods(&self.db, owner, 3).await?;
        let active = behavior::goals_with_status(&self.db, owner, GoalStatus::Active).await?;
        let completions_14d =
            behavior::completed_actions_since(&self.db, owner, now - Duration::days(14)).await?;
        let inputs = RiskInputs {
            last_journal_at: last_journal_at.as_deref().and_then(parse_ts),
            latest_moods: latest_moods.into_iter().map(|m| m.mood).collect(),
            has_active_goal: !active.is_empty(),
            completions_14d,
        };
        Ok(assess_risks(&inputs, now))
    }

    async fn momentum(&self, owner: &str, now: DateTime<Utc>) -> Result<Momentum, NudgeflowError> {
        let active = behavior::goals_with_status(&self.db, owner, GoalStatus::Active).await?;
        let counts = behavior::action_counts(&self.db, owner).await?;
        let recent_completions =
            behavior::completed_actions_since(&self.db, owner, now - Duration::days(7)).await?;
        let timestamps = behavior::activity_timestamps(
            &self.db,
            owner,
            now - Duration::days(STREAK_LOOKBACK_DAYS),
        )
        .await?;

        let dates = activity_dates(timestamps.iter().map(String::as_str));
        let (streak_days, max_streak) = streaks(&dates, now.date_naive());
        let completion_rate = if counts.total == 0 {
            0.0
        } else {
            counts.completed as f64 / counts.total as f64
        };
        Ok(Momentum {
            active_goal_count: active.len() as u32,
            streak_days,
            max_streak,
            completion_rate,
            recent_completions,
            last_activity_at: timestamps.into_iter().max(),
        })
    }

    async fn active_goal(&self, owner: &str) -> Result<Option<ActiveGoal>, NudgeflowError> {
        let goals = behavior::goals_with_status(&self.db, owner, GoalStatus::Active).await?;
        Ok(goals.into_iter().next().map(|g| ActiveGoal {
            id: g.id,
            title: g.title,
            progress: g.progress,
            created_at: g.created_at,
            last_activity_at: g.last_activity_at,
        }))
    }

    async fn mood(&self, owner: &str, now: DateTime<Utc>) -> Result<MoodSummary, NudgeflowError> {
        let window = behavior::moods_since(&self.db, owner, now - Duration::days(MOOD_WINDOW_DAYS)).await?;
        let last = behavior::latest_moods(&self.db, owner, 1).await?;
        let values: Vec<f64> = window.iter().map(|m| m.mood).collect();
        Ok(MoodSummary {
            average: (!values.is_empty()).then(|| mean(&values)),
            trend: classify_trend(&values),
            days_since_last: last
                .first()
                .and_then(|m| parse_ts(&m.created_at))
                .map(|at| (now - at).num_days()),
            values,
        })
    }

    async fn profile(&self, owner: &str) -> Result<UserProfile, NudgeflowError> {
        Ok(settings::profile(&self.db, owner)
            .await?
            .unwrap_or_else(|| UserProfile::defaults_for(owner)))
    }

    async fn connections(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<String>, NudgeflowError> {
        let recent = relations::recent_connections(
            &self.db,
            owner,
            now - Duration::days(CONNECTION_DAYS),
            CONNECTION_LIMIT,
        )
        .await?;
        Ok(recent
            .into_iter()
            .map(|c| format!("{}↔{}:{}", c.source_feature, c.target_feature, c.relation_type))
            .collect())
    }
}
