// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engagement recovery after a break.

use nudgeflow_core::types::parse_ts;
use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack, feature_surface};
use crate::candidate::Candidate;

const LAPSED_MIN_DAYS: i64 = 7;
const LAPSED_MAX_DAYS: i64 = 14;
const RESTART_MAX_STREAK: u32 = 5;

pub struct EngagementRecovery;

impl RulePack for EngagementRecovery {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        let momentum = &input.summary.momentum;
        let mut out = Vec::new();

        let days_away = momentum
            .last_activity_at
            .as_deref()
            .and_then(parse_ts)
            .map(|at| (input.now - at).num_days());
        if let Some(days) = days_away.filter(|d| (LAPSED_MIN_DAYS..=LAPSED_MAX_DAYS).contains(d)) {
            out.push(
                Candidate::new(
                    "recovery.lapsed",
                    NudgeKind::Reengagement,
                    Surface::Home,
                    6,
                    "Welcome back",
                    "It's been a little while. No catching up needed, just start wherever you are.",
                )
                .explain(format!("Last active {days} days ago")),
            );
        }

        if momentum.streak_days == 0 && momentum.max_streak >= RESTART_MAX_STREAK {
            out.push(
                Candidate::new(
                    "recovery.restart_streak",
                    NudgeKind::Reengagement,
                    Surface::Home,
                    5,
                    "Start a new streak",
                    format!(
                        "You once kept going for {} days. One small step today starts the next run.",
                        momentum.max_streak
                    ),
                )
                .explain(format!("Best streak was {} days, current streak is 0", momentum.max_streak))
                .with_payload("max_streak", momentum.max_streak),
            );
        }

        for feature in &input.signals.lapsed_features {
            out.push(
                Candidate::new(
                    format!("recovery.feature_winback.{feature}"),
                    NudgeKind::Suggestion,
                    feature_surface(feature),
                    3,
                    "Something you used to enjoy",
                    format!("You haven't opened {feature} in a while. It's still here when you want it."),
                )
                .explain(format!("Used {feature} this month but not this week"))
                .with_payload("feature", feature.clone()),
            );
        }
        out
    }
}
