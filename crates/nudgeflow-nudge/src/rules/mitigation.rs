// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Risk mitigation: abandoned goals, mood swings, goal overload.

use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack};
use crate::candidate::Candidate;

const VOLATILITY_MIN_POINTS: usize = 4;
const OVERLOAD_GOALS: u64 = 3;

pub struct RiskMitigation {
    volatility_threshold: f64,
}

impl RiskMitigation {
    pub fn new(volatility_threshold: f64) -> Self {
        Self { volatility_threshold }
    }
}

impl RulePack for RiskMitigation {
    fn name(&self) -> &'static str {
        "mitigation"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        let mut out = Vec::new();

        // Only the longest-idle goal; the rest would dedup away anyway.
        if let Some(goal) = input.signals.stale_goals.iter().max_by_key(|g| g.days_inactive) {
            out.push(
                Candidate::new(
                    "mitigation.abandoned_goal",
                    NudgeKind::GoalReview,
                    Surface::Goals,
                    6,
                    "Still working on this?",
                    format!(
                        "\"{}\" hasn't moved in {} days. Adjust it, shrink it, or let it go.",
                        goal.title, goal.days_inactive
                    ),
                )
                .explain(format!("No activity on an active goal for {} days", goal.days_inactive))
                .cta("Review goal", "open_goal")
                .with_payload("goal_id", goal.id.clone()),
            );
        }

        let mood = &input.summary.mood;
        if mood.points() >= VOLATILITY_MIN_POINTS {
            let variance = mood.variance();
            if variance > self.volatility_threshold {
                out.push(
                    Candidate::new(
                        "mitigation.mood_volatility",
                        NudgeKind::MoodCheckin,
                        Surface::Mood,
                        6,
                        "Ups and downs lately",
                        "Your mood has been swinging. Noting what happens around the shifts can reveal patterns.",
                    )
                    .explain(format!("Mood variance of {variance:.2} over recent check-ins"))
                    .cta("Check in", "open_mood"),
                );
            }
        }

        let new_goals = input.signals.new_goals_without_completions;
        if new_goals >= OVERLOAD_GOALS {
            out.push(
                Candidate::new(
                    "mitigation.goal_overload",
                    NudgeKind::GoalReview,
                    Surface::Goals,
                    5,
                    "One thing at a time",
                    "You've started several new goals. Picking one to focus on this week can make progress easier.",
                )
                .explain(format!("{new_goals} new goals without a completed action in two weeks"))
                .cta("Choose a focus", "open_goals"),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::signals::{BehaviorSignals, StaleGoal};

    fn pack() -> RiskMitigation {
        RiskMitigation::new(2.25)
    }

    #[test]
    fn longest_idle_goal_is_reviewed() {
        let signals = BehaviorSignals {
            stale_goals: vec![
                StaleGoal {
                    id: "g1".into(),
                    title: "Run".into(),
                    days_inactive: 15,
                },
                StaleGoal {
                    id: "g2".into(),
                    title: "Read".into(),
                    days_inactive: 40,
                },
            ],
            ..BehaviorSignals::default()
        };
        let out = run(&pack(), &quiet_summary(), &signals);
        assert_eq!(rules(&out), vec!["mitigation.abandoned_goal"]);
        assert!(out[0].message.contains("Read"));
    }

    #[test]
    fn volatility_needs_points_and_spread() {
        let mut summary = quiet_summary();
        summary.mood.values = vec![1.0, 6.0, 1.0];
        assert!(run(&pack(), &summary, &BehaviorSignals::default()).is_empty());

        summary.mood.values = vec![1.0, 6.0, 1.0, 6.0];
        let out = run(&pack(), &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["mitigation.mood_volatility"]);

        summary.mood.values = vec![3.0, 4.0, 3.0, 4.0];
        assert!(run(&pack(), &summary, &BehaviorSignals::default()).is_empty());
    }

    #[test]
    fn volatility_threshold_applies_to_variance() {
        let mut summary = quiet_summary();
        // Variance 2.25, standard deviation 1.5.
        summary.mood.values = vec![1.0, 4.0, 1.0, 4.0];
        let out = run(&RiskMitigation::new(2.0), &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["mitigation.mood_volatility"]);
        assert!(out[0].explanation.contains("2.25"));

        // Variance 1.0 stays under the same threshold.
        summary.mood.values = vec![2.0, 4.0, 2.0, 4.0];
        assert!(run(&RiskMitigation::new(2.0), &summary, &BehaviorSignals::default()).is_empty());
    }

    #[test]
    fn overload_threshold() {
        let mut signals = BehaviorSignals {
            new_goals_without_completions: 2,
            ..BehaviorSignals::default()
        };
        assert!(run(&pack(), &quiet_summary(), &signals).is_empty());
        signals.new_goals_without_completions = 3;
        let out = run(&pack(), &quiet_summary(), &signals);
        assert_eq!(rules(&out), vec!["mitigation.goal_overload"]);
    }
}
