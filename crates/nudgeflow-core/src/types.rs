// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across adapter traits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of external collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Completion,
    Embedding,
    Cache,
    Observability,
}

/// A single completion call: one system prompt, one user prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    /// Sampling temperature; `None` uses the provider default.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Builds a request with the default token budget.
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 512,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The raw text returned by a completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
}

/// A fire-and-forget trace or score event for the observability sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    pub owner: Option<String>,
    pub attributes: BTreeMap<String, serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl TraceEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            attributes: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Fixed-width UTC timestamp format used for every stored timestamp.
///
/// Lexicographic order of the text matches chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Formats a timestamp for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a stored timestamp. Accepts RFC 3339 as well as the storage format.
pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format_round_trips() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 5).unwrap();
        let text = format_ts(ts);
        assert_eq!(text, "2026-03-01T08:30:05.000Z");
        assert_eq!(parse_ts(&text), Some(ts));
    }

    #[test]
    fn timestamp_text_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        assert!(format_ts(early) < format_ts(late));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_ts("yesterday").is_none());
    }

    #[test]
    fn trace_event_builder_collects_attributes() {
        let event = TraceEvent::new("retrieve")
            .owner("user-1")
            .attr("blocks", 3)
            .attr("cache_hit", false);
        assert_eq!(event.owner.as_deref(), Some("user-1"));
        assert_eq!(event.attributes.len(), 2);
        assert_eq!(event.attributes["blocks"], serde_json::json!(3));
    }
}
