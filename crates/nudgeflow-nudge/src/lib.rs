// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge rule engine for nudgeflow.
//!
//! Deterministic rule packs run first. A guarded language-model fallback
//! only fills in when no rule matched. Candidates are then filtered by
//! surface, deduplicated by kind, held back in quiet hours, ranked, and
//! capped at the owner's remaining daily budget before being stored.

pub mod cadence;
pub mod candidate;
pub mod engine;
pub mod fallback;
pub mod rules;
pub mod signals;

pub use candidate::Candidate;
pub use engine::{NudgeEngine, context_snapshot};
pub use rules::{RuleInput, RulePack, default_packs};
pub use signals::BehaviorSignals;
