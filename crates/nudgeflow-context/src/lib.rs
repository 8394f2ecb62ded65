// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context integrator for nudgeflow.
//!
//! Merges memory themes, behavioral signals, and the personalization profile
//! into one [`ContextSummary`], the input of the nudge rule engine.

pub mod integrator;
pub mod signals;
pub mod types;

pub use integrator::ContextIntegrator;
pub use types::{
    ActiveGoal, ContextSummary, Momentum, MoodSummary, RiskFlag, RiskKind, Severity, Trend,
};
