// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Celebrate streaks, goal progress, and follow-through.

use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack};
use crate::candidate::Candidate;

const STREAK_DAYS: u32 = 5;
const GOAL_PROGRESS: f64 = 0.5;
const COMPLETION_RATE: f64 = 0.7;

pub struct MomentumCelebration;

impl RulePack for MomentumCelebration {
    fn name(&self) -> &'static str {
        "momentum"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        let momentum = &input.summary.momentum;
        let mut out = Vec::new();

        if momentum.streak_days >= STREAK_DAYS {
            out.push(
                Candidate::new(
                    "momentum.streak",
                    NudgeKind::Celebration,
                    Surface::Home,
                    6,
                    format!("{} days in a row", momentum.streak_days),
                    "You've shown up every day. That consistency is worth noticing.",
                )
                .explain(format!("Active {} consecutive days", momentum.streak_days))
                .with_payload("streak_days", momentum.streak_days),
            );
        }

        if let Some(goal) = input
            .summary
            .active_goal
            .as_ref()
            .filter(|g| g.progress >= GOAL_PROGRESS)
        {
            let percent = (goal.progress * 100.0).round();
            out.push(
                Candidate::new(
                    "momentum.goal_progress",
                    NudgeKind::Celebration,
                    Surface::Goals,
                    5,
                    "Past the halfway mark",
                    format!("\"{}\" is {percent:.0}% done. Keep it rolling.", goal.title),
                )
                .explain(format!("Goal progress is {percent:.0}%"))
                .with_payload("goal_id", goal.id.clone()),
            );
        }

        if momentum.completion_rate >= COMPLETION_RATE && momentum.recent_completions > 0 {
            let percent = (momentum.completion_rate * 100.0).round();
            out.push(
                Candidate::new(
                    "momentum.completion_rate",
                    NudgeKind::Celebration,
                    Surface::Goals,
                    4,
                    "You follow through",
                    format!("You've completed {percent:.0}% of the actions you planned."),
                )
                .explain(format!("Action completion rate is {percent:.0}%")),
            );
        }
        out
    }
}
