// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure computations behind each part of the context summary.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use nudgeflow_core::types::parse_ts;

use crate::types::{RiskFlag, RiskKind, Severity, Trend};

/// Half-window mean difference beyond which a mood trend is not stable.
pub const TREND_THRESHOLD: f64 = 0.5;

/// Average of the three most recent moods at or below which mood is low.
pub const LOW_MOOD_THRESHOLD: f64 = 2.5;

/// Rank themes by frequency, ties alphabetical, keep the first `limit`.
pub fn rank_themes(theme_lists: Vec<Vec<String>>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for theme in theme_lists.into_iter().flatten() {
        let theme = theme.trim().to_lowercase();
        if !theme.is_empty() {
            *counts.entry(theme).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}

/// Classify mood values (oldest first) by comparing half-window means.
///
/// The first half is `values[..n/2]`, the second `values[n/2..]`. Fewer than
/// two points is `Stable`.
pub fn classify_trend(values: &[f64]) -> Trend {
    if values.len() < 2 {
        return Trend::Stable;
    }
    let (first, second) = values.split_at(values.len() / 2);
    let diff = mean(second) - mean(first);
    if diff > TREND_THRESHOLD {
        Trend::Improving
    } else if diff < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Current and longest runs of consecutive activity dates.
///
/// The current run walks back from `today` and is zero when `today` has no
/// activity.
pub fn streaks(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> (u32, u32) {
    let mut current = 0;
    let mut day = Some(today);
    while let Some(d) = day.filter(|d| dates.contains(d)) {
        current += 1;
        day = d.pred_opt();
    }

    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &d in dates {
        run = match prev {
            Some(p) if p.succ_opt() == Some(d) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(d);
    }
    (current, longest.max(current))
}

/// Distinct UTC dates of the given timestamps; unparseable ones are skipped.
pub fn activity_dates<'a>(timestamps: impl IntoIterator<Item = &'a str>) -> BTreeSet<NaiveDate> {
    timestamps
        .into_iter()
        .filter_map(parse_ts)
        .map(|t| t.date_naive())
        .collect()
}

/// Inputs of the fixed risk rule set.
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    pub last_journal_at: Option<DateTime<Utc>>,
    /// Most recent mood values, newest first. Only the first three are used.
    pub latest_moods: Vec<f64>,
    pub has_active_goal: bool,
    /// Goal actions completed in the last 14 days.
    pub completions_14d: u64,
}

/// Apply the fixed risk rules.
pub fn assess_risks(inputs: &RiskInputs, now: DateTime<Utc>) -> Vec<RiskFlag> {
    let mut risks = Vec::new();

    let journaled_recently = inputs
        .last_journal_at
        .is_some_and(|at| now - at < Duration::days(7));
    if !journaled_recently {
        risks.push(RiskFlag {
            kind: RiskKind::NoJournal7d,
            severity: Severity::Low,
            description: "No journal entries in the last 7 days".to_string(),
        });
    }

    let recent: Vec<f64> = inputs.latest_moods.iter().take(3).copied().collect();
    if recent.len() == 3 && mean(&recent) <= LOW_MOOD_THRESHOLD {
        risks.push(RiskFlag {
            kind: RiskKind::LowMood3d,
            severity: Severity::Medium,
            description: format!(
                "Average of the last 3 mood check-ins is {:.1} of 6",
                mean(&recent)
            ),
        });
    }

    if inputs.has_active_goal && inputs.completions_14d == 0 {
        risks.push(RiskFlag {
            kind: RiskKind::StalledGoal14d,
            severity: Severity::Low,
            description: "No goal actions completed in the last 14 days".to_string(),
        });
    }
    risks
}
