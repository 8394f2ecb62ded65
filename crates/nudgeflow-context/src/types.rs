// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The context summary and its parts.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use nudgeflow_storage::UserProfile;

/// Stable identifier of a risk flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
pub enum RiskKind {
    #[strum(serialize = "no_journal_7d")]
    #[serde(rename = "no_journal_7d")]
    NoJournal7d,
    #[strum(serialize = "low_mood_3d")]
    #[serde(rename = "low_mood_3d")]
    LowMood3d,
    #[strum(serialize = "stalled_goal_14d")]
    #[serde(rename = "stalled_goal_14d")]
    StalledGoal14d,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub kind: RiskKind,
    pub severity: Severity,
    pub description: String,
}

/// Engagement and goal follow-through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub active_goal_count: u32,
    /// Consecutive active days ending today (or yesterday).
    pub streak_days: u32,
    /// Longest run of consecutive active days in the lookback window.
    pub max_streak: u32,
    /// Completed goal actions over all goal actions, 0 when there are none.
    pub completion_rate: f64,
    /// Goal actions completed in the last 7 days.
    pub recent_completions: u64,
    pub last_activity_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    #[default]
    Stable,
    Declining,
}

/// Mood over the trend window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodSummary {
    /// Mean over the window, `None` with no check-ins.
    pub average: Option<f64>,
    pub trend: Trend,
    /// Check-in values in the window, oldest first.
    pub values: Vec<f64>,
    pub days_since_last: Option<i64>,
}

impl MoodSummary {
    pub fn points(&self) -> usize {
        self.values.len()
    }

    /// Population variance of the window values.
    pub fn variance(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.values.iter().sum::<f64>() / n as f64;
        self.values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64
    }
}

/// The most recently active goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveGoal {
    pub id: String,
    pub title: String,
    pub progress: f64,
    pub created_at: String,
    pub last_activity_at: Option<String>,
}

/// Everything the nudge engine knows about a user at one moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSummary {
    pub owner: String,
    pub generated_at: String,
    /// Top themes of the last 7 days, most frequent first.
    pub themes: Vec<String>,
    pub risks: Vec<RiskFlag>,
    pub momentum: Momentum,
    pub active_goal: Option<ActiveGoal>,
    pub mood: MoodSummary,
    pub profile: UserProfile,
    /// Recent relations as `"{source_feature}↔{target_feature}:{relation_type}"`.
    pub connections: Vec<String>,
}

impl ContextSummary {
    pub fn has_risk(&self, kind: RiskKind) -> bool {
        self.risks.iter().any(|r| r.kind == kind)
    }

    /// Enough signal to say something specific: at least two themes, an
    /// active goal, or three mood points.
    pub fn is_rich(&self) -> bool {
        self.themes.len() >= 2 || self.active_goal.is_some() || self.mood.points() >= 3
    }
}
