// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One response per risk flag.

use nudgeflow_context::RiskKind;
use nudgeflow_storage::{NudgeKind, Surface};

use super::{RuleInput, RulePack};
use crate::candidate::Candidate;

pub struct RiskHygiene;

impl RulePack for RiskHygiene {
    fn name(&self) -> &'static str {
        "risk"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate> {
        input
            .summary
            .risks
            .iter()
            .map(|risk| {
                let candidate = match risk.kind {
                    RiskKind::NoJournal7d => Candidate::new(
                        "risk.no_journal_7d",
                        NudgeKind::JournalPrompt,
                        Surface::Journal,
                        5,
                        "A quiet week on the page",
                        "It's been a while since you wrote. What's one thing on your mind today?",
                    )
                    .cta("Open journal", "open_journal"),
                    RiskKind::LowMood3d => Candidate::new(
                        "risk.low_mood_3d",
                        NudgeKind::CopingTool,
                        Surface::Tools,
                        8,
                        "Be gentle with yourself",
                        "The last few days look heavy. A grounding exercise can take the edge off.",
                    )
                    .cta("Try grounding", "open_tools"),
                    RiskKind::StalledGoal14d => Candidate::new(
                        "risk.stalled_goal_14d",
                        NudgeKind::GoalCheckin,
                        Surface::Goals,
                        5,
                        "Small step, real progress",
                        "Your goal has been waiting. Could you pick one tiny action for today?",
                    )
                    .cta("Pick an action", "open_goals"),
                };
                candidate
                    .explain(risk.description.clone())
                    .with_payload("risk", risk.kind.as_ref())
            })
            .collect()
    }
}
