// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-feature bridges: carry momentum from one feature into another.

use chrono::Duration;

use nudgeflow_context::Trend;
use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack};
use crate::candidate::Candidate;

/// Latest mood at or below which a coping tool is offered.
const LOW_LATEST_MOOD: f64 = 3.0;

pub struct CrossFeatureBridges {
    tool_window: Duration,
}

impl CrossFeatureBridges {
    pub fn new(tool_window_mins: i64) -> Self {
        Self {
            tool_window: Duration::minutes(tool_window_mins),
        }
    }
}

impl RulePack for CrossFeatureBridges {
    fn name(&self) -> &'static str {
        "bridge"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        let mut out = Vec::new();
        let summary = input.summary;

        let recent_tool = input
            .signals
            .last_tool_completion
            .as_ref()
            .filter(|t| input.now - t.completed_at <= self.tool_window && t.completed_at <= input.now);

        if let Some(tool) = recent_tool {
            let minutes = (input.now - tool.completed_at).num_minutes();
            out.push(
                Candidate::new(
                    "bridge.tool_to_journal",
                    NudgeKind::JournalPrompt,
                    Surface::Journal,
                    6,
                    "Capture how that felt",
                    format!("You just finished {}. A few lines now can help the calm stick.", tool.tool_name),
                )
                .explain(format!("Completed {} {minutes} minutes ago", tool.tool_name))
                .cta("Write a quick note", "open_journal")
                .with_payload("tool", tool.tool_name.clone()),
            );
        }

        let fresh_low_mood = summary
            .mood
            .values
            .last()
            .copied()
            .filter(|m| *m <= LOW_LATEST_MOOD)
            .filter(|_| summary.mood.days_since_last.is_some_and(|d| d <= 1));
        if let (Some(mood), None) = (fresh_low_mood, recent_tool) {
            out.push(
                Candidate::new(
                    "bridge.mood_to_tool",
                    NudgeKind::CopingTool,
                    Surface::Tools,
                    6,
                    "A two-minute reset",
                    "Your last check-in was on the low side. A short breathing exercise might help.",
                )
                .explain(format!("Latest mood check-in was {mood:.0} of 6"))
                .cta("Start breathing", "open_tools"),
            );
        }

        let journal_goal_link = summary
            .connections
            .iter()
            .any(|c| c.starts_with("journal↔goals:") || c.starts_with("goals↔journal:"));
        let linked_goal = summary
            .active_goal
            .as_ref()
            .filter(|_| journal_goal_link && summary.mood.trend != Trend::Declining);
        if let Some(goal) = linked_goal {
            out.push(
                Candidate::new(
                    "bridge.journal_to_goal",
                    NudgeKind::GoalCheckin,
                    Surface::Goals,
                    5,
                    "Your writing points to your goal",
                    format!("Recent entries connect to \"{}\". Want to pick a next step?", goal.title),
                )
                .explain("Recent journal entries are linked to an active goal")
                .cta("Plan a step", "open_goal")
                .with_payload("goal_id", goal.id.clone()),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use nudgeflow_context::ActiveGoal;

    use super::super::testing::*;
    use super::*;
    use crate::signals::{BehaviorSignals, ToolCompletion};

    fn pack() -> CrossFeatureBridges {
        CrossFeatureBridges::new(120)
    }

    fn tool_at(minutes_ago: i64) -> BehaviorSignals {
        BehaviorSignals {
            last_tool_completion: Some(ToolCompletion {
                tool_name: "box breathing".into(),
                completed_at: now() - Duration::minutes(minutes_ago),
            }),
            ..BehaviorSignals::default()
        }
    }

    #[test]
    fn recent_tool_suggests_journaling() {
        let out = run(&pack(), &quiet_summary(), &tool_at(30));
        assert_eq!(rules(&out), vec!["bridge.tool_to_journal"]);
        assert_eq!(out[0].explanation, "Completed box breathing 30 minutes ago");
    }

    #[test]
    fn old_tool_is_ignored() {
        assert!(run(&pack(), &quiet_summary(), &tool_at(121)).is_empty());
    }

    #[test]
    fn low_latest_mood_offers_a_tool() {
        let mut summary = quiet_summary();
        summary.mood.values = vec![4.0, 2.0];
        summary.mood.days_since_last = Some(0);
        let out = run(&pack(), &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["bridge.mood_to_tool"]);

        // Not when a tool was just used.
        let out = run(&pack(), &summary, &tool_at(10));
        assert_eq!(rules(&out), vec!["bridge.tool_to_journal"]);
    }

    #[test]
    fn journal_goal_connection() {
        let mut summary = quiet_summary();
        summary.connections = vec!["journal↔goals:supports".into()];
        summary.active_goal = Some(ActiveGoal {
            id: "g1".into(),
            title: "Sleep by 11".into(),
            progress: 0.2,
            created_at: "2026-02-01T00:00:00.000Z".into(),
            last_activity_at: None,
        });
        let out = run(&pack(), &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["bridge.journal_to_goal"]);
    }
}
