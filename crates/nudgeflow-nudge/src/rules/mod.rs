// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic rule packs.
//!
//! Each pack is a pure function of the context summary plus the bounded
//! behavioral lookups in [`BehaviorSignals`]. Packs run in the order
//! returned by [`default_packs`].

mod bridges;
mod celebration;
mod mitigation;
mod recovery;
mod risk_hygiene;
mod wellness;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use nudgeflow_config::NudgeConfig;
use nudgeflow_context::ContextSummary;
use nudgeflow_storage::Surface;

use crate::candidate::Candidate;
use crate::signals::BehaviorSignals;

pub use bridges::CrossFeatureBridges;
pub use celebration::MomentumCelebration;
pub use mitigation::RiskMitigation;
pub use recovery::EngagementRecovery;
pub use risk_hygiene::RiskHygiene;
pub use wellness::WellnessCheckpoints;

/// Everything a rule pack may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub summary: &'a ContextSummary,
    pub signals: &'a BehaviorSignals,
    pub now: DateTime<Utc>,
}

impl RuleInput<'_> {
    /// `now` in the owner's local time.
    pub fn local_now(&self) -> NaiveDateTime {
        (self.now + Duration::minutes(i64::from(self.summary.profile.utc_offset_minutes))).naive_utc()
    }
}

/// A deterministic source of candidate nudges.
pub trait RulePack: Send + Sync {
    /// Stable pack name, used as the prefix of its rule identifiers.
    fn name(&self) -> &'static str;

    fn evaluate(&self, input: &RuleInput<'_>) -> Vec<Candidate>;
}

/// The packs in evaluation order.
pub fn default_packs(config: &NudgeConfig) -> Vec<Box<dyn RulePack>> {
    vec![
        Box::new(CrossFeatureBridges::new(config.tool_bridge_window_mins)),
        Box::new(RiskHygiene),
        Box::new(MomentumCelebration),
        Box::new(WellnessCheckpoints),
        Box::new(RiskMitigation::new(config.mood_volatility_threshold)),
        Box::new(EngagementRecovery),
    ]
}

/// Surface a source feature's nudges should appear on.
pub fn feature_surface(feature: &str) -> Surface {
    match feature {
        "journal" => Surface::Journal,
        "goals" => Surface::Goals,
        "tools" => Surface::Tools,
        "chat" => Surface::Chat,
        "mood" => Surface::Mood,
        _ => Surface::Home,
    }
}
