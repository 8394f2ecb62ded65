// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Candidate nudges produced by rule packs and the fallback.

use nudgeflow_storage::{NudgeKind, Payload, PayloadValue, Surface};

/// Highest priority a candidate may carry.
pub const MAX_PRIORITY: u8 = 10;

/// A nudge before dedup, cadence, and persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: NudgeKind,
    pub surface: Surface,
    pub title: String,
    pub message: String,
    pub cta_label: Option<String>,
    pub cta_payload: Payload,
    /// 0 to 10, higher is more important.
    pub priority: u8,
    pub source_rule: String,
    /// Why this nudge, in words a user could read.
    pub explanation: String,
}

impl Candidate {
    pub fn new(
        source_rule: impl Into<String>,
        kind: NudgeKind,
        surface: Surface,
        priority: u8,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            surface,
            title: title.into(),
            message: message.into(),
            cta_label: None,
            cta_payload: Payload::new(),
            priority: priority.min(MAX_PRIORITY),
            source_rule: source_rule.into(),
            explanation: String::new(),
        }
    }

    pub fn explain(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    /// Set the call-to-action label with an `action` entry in its payload.
    pub fn cta(mut self, label: impl Into<String>, action: &str) -> Self {
        self.cta_label = Some(label.into());
        self.cta_payload.insert("action".to_string(), PayloadValue::from(action));
        self
    }

    pub fn with_payload(mut self, key: &str, value: impl Into<PayloadValue>) -> Self {
        self.cta_payload.insert(key.to_string(), value.into());
        self
    }
}
