// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wellness checkpoints: sustained low mood, inactivity, burnout, weekends.

use chrono::{Datelike, Weekday};

use nudgeflow_context::Trend;
use nudgeflow_core::types::parse_ts;
use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack};
use crate::candidate::Candidate;

const SUSTAINED_LOW_AVERAGE: f64 = 2.5;
const SUSTAINED_LOW_POINTS: usize = 5;
const INACTIVE_DAYS: i64 = 3;
const BURNOUT_STREAK: u32 = 7;

pub struct WellnessCheckpoints;

impl RulePack for WellnessCheckpoints {
    fn name(&self) -> &'static str {
        "wellness"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        let summary = input.summary;
        let mut out = Vec::new();

        if let Some(avg) = summary
            .mood
            .average
            .filter(|a| *a <= SUSTAINED_LOW_AVERAGE && summary.mood.points() >= SUSTAINED_LOW_POINTS)
        {
            out.push(
                Candidate::new(
                    "wellness.sustained_low_mood",
                    NudgeKind::Rest,
                    Surface::Home,
                    7,
                    "Time to recharge",
                    "It's been a tough stretch. Consider blocking out some rest, and reaching out to someone you trust.",
                )
                .explain(format!(
                    "Average mood {avg:.1} of 6 over {} check-ins",
                    summary.mood.points()
                )),
            );
        }

        let days_inactive = summary
            .momentum
            .last_activity_at
            .as_deref()
            .and_then(parse_ts)
            .map(|at| (input.now - at).num_days());
        if let Some(days) = days_inactive.filter(|d| *d >= INACTIVE_DAYS) {
            out.push(
                Candidate::new(
                    "wellness.inactivity",
                    NudgeKind::MoodCheckin,
                    Surface::Mood,
                    5,
                    "How are you doing?",
                    "A quick check-in takes ten seconds and helps us support you better.",
                )
                .explain(format!("No activity for {days} days"))
                .cta("Check in", "open_mood"),
            );
        }

        if summary.momentum.streak_days >= BURNOUT_STREAK && summary.mood.trend == Trend::Declining {
            out.push(
                Candidate::new(
                    "wellness.burnout",
                    NudgeKind::Rest,
                    Surface::Home,
                    8,
                    "Rest is part of progress",
                    "You've been going hard while your mood dips. A lighter day could help you keep going.",
                )
                .explain(format!(
                    "{}-day streak with a declining mood trend",
                    summary.momentum.streak_days
                )),
            );
        }

        if matches!(input.local_now().weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(
                Candidate::new(
                    "wellness.weekend_reflection",
                    NudgeKind::Reflection,
                    Surface::Journal,
                    3,
                    "Look back on your week",
                    "What went well this week, and what would you like to carry into the next?",
                )
                .explain("Weekend reflection prompt")
                .cta("Reflect", "open_journal"),
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use nudgeflow_core::types::format_ts;

    use super::super::testing::*;
    use super::*;
    use crate::signals::BehaviorSignals;

    #[test]
    fn sustained_low_mood_needs_enough_points() {
        let mut summary = quiet_summary();
        summary.mood.values = vec![2.0; 4];
        summary.mood.average = Some(2.0);
        assert!(run(&WellnessCheckpoints, &summary, &BehaviorSignals::default()).is_empty());

        summary.mood.values = vec![2.0; 5];
        let out = run(&WellnessCheckpoints, &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["wellness.sustained_low_mood"]);
    }

    #[test]
    fn inactivity_and_burnout() {
        let mut summary = quiet_summary();
        summary.momentum.last_activity_at = Some(format_ts(now() - Duration::days(3)));
        let out = run(&WellnessCheckpoints, &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["wellness.inactivity"]);

        let mut summary = quiet_summary();
        summary.momentum.streak_days = 9;
        summary.mood.trend = Trend::Declining;
        let out = run(&WellnessCheckpoints, &summary, &BehaviorSignals::default());
        assert_eq!(rules(&out), vec!["wellness.burnout"]);
        assert_eq!(out[0].priority, 8);
    }

    #[test]
    fn weekend_is_local() {
        let summary = quiet_summary();
        let signals = BehaviorSignals::default();
        // Saturday 01:00 UTC is still Friday evening at UTC-5.
        let saturday_early = Utc.with_ymd_and_hms(2026, 3, 7, 1, 0, 0).unwrap();
        let mut eastern = summary.clone();
        eastern.profile.utc_offset_minutes = -300;
        eastern.momentum.last_activity_at = Some(format_ts(saturday_early));
        let out = WellnessCheckpoints.evaluate(&RuleInput {
            summary: &eastern,
            signals: &signals,
            now: saturday_early,
        });
        assert!(out.is_empty());

        let mut utc = summary;
        utc.momentum.last_activity_at = Some(format_ts(saturday_early));
        let out = WellnessCheckpoints.evaluate(&RuleInput {
            summary: &utc,
            signals: &signals,
            now: saturday_early,
        });
        assert_eq!(rules(&out), vec!["wellness.weekend_reflection"]);
    }
}
