// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Guarded language-model fallback.
//!
//! Runs only when no rule matched, the owner has budget, LLM nudges are
//! switched on, and the context has something specific to say.

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use nudgeflow_context::ContextSummary;
use nudgeflow_core::{CompletionAdapter, CompletionRequest, NudgeflowError};
use nudgeflow_memory::parse::{parse_reply, truncate_chars};
use nudgeflow_storage::queries::blocks;
use nudgeflow_storage::{Database, MemoryBlock, NudgeKind, Surface};

use crate::candidate::Candidate;

pub const FALLBACK_RULE: &str = "llm-fallback";
pub const FALLBACK_PRIORITY: u8 = 4;
pub const MAX_TITLE_CHARS: usize = 40;
pub const MAX_MESSAGE_CHARS: usize = 150;

/// Recent blocks considered before ranking snippets by relevance.
const SNIPPET_POOL: usize = 20;

const FALLBACK_SYSTEM_PROMPT: &str = "You write one short, warm, actionable nudge for a personal \
coaching app. Never mention crisis topics, diagnoses, or self-harm. Respond with only a JSON object: \
{\"kind\": one of journal_prompt|coping_tool|mood_checkin|goal_checkin|reflection|rest|suggestion, \
\"surface\": one of home|journal|goals|tools|chat|mood, \"title\": at most 40 characters, \
\"message\": at most 150 characters, \"cta_label\": optional short button text}";

#[derive(Debug, Deserialize)]
struct FallbackReply {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    surface: Option<String>,
    title: String,
    message: String,
    #[serde(default)]
    cta_label: Option<String>,
}

/// Whether the context carries enough signal for a personalized suggestion.
pub fn gate_open(summary: &ContextSummary, llm_enabled: bool) -> bool {
    llm_enabled && summary.profile.daily_nudge_budget > 0 && summary.is_rich()
}

/// Top snippets by relevance, never crisis or sensitive content.
pub fn pick_snippets(mut pool: Vec<MemoryBlock>, count: usize) -> Vec<MemoryBlock> {
    pool.retain(|b| !b.is_crisis && !b.is_sensitive);
    pool.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    pool.truncate(count);
    pool
}

/// Map a fallback reply onto a candidate, enforcing the length limits.
fn to_candidate(reply: FallbackReply) -> Option<Candidate> {
    let title = reply.title.trim();
    let message = reply.message.trim();
    if title.is_empty() || message.is_empty() {
        return None;
    }
    let kind = reply
        .kind
        .as_deref()
        .and_then(|k| NudgeKind::from_str(k.trim()).ok())
        .unwrap_or(NudgeKind::Suggestion);
    let surface = reply
        .surface
        .as_deref()
        .and_then(|s| Surface::from_str(s.trim()).ok())
        .unwrap_or(Surface::Home);
    let mut candidate = Candidate::new(
        FALLBACK_RULE,
        kind,
        surface,
        FALLBACK_PRIORITY,
        truncate_chars(title, MAX_TITLE_CHARS),
        truncate_chars(message, MAX_MESSAGE_CHARS),
    )
    .explain("No rule matched; suggested from recent memories");
    if let Some(label) = reply.cta_label.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) {
        candidate.cta_label = Some(truncate_chars(&label, MAX_TITLE_CHARS));
    }
    Some(candidate)
}

fn user_prompt(summary: &ContextSummary, snippets: &[MemoryBlock]) -> String {
    let mut prompt = String::new();
    if !summary.themes.is_empty() {
        prompt.push_str(&format!("Recent themes: {}\n", summary.themes.join(", ")));
    }
    if let Some(goal) = &summary.active_goal {
        prompt.push_str(&format!(
            "Active goal: {} ({:.0}% done)\n",
            goal.title,
            goal.progress * 100.0
        ));
    }
    if let Some(avg) = summary.mood.average {
        prompt.push_str(&format!(
            "Mood: average {avg:.1} of 6, trend {}\n",
            summary.mood.trend
        ));
    }
    if !snippets.is_empty() {
        prompt.push_str("Recent notes:\n");
        for block in snippets {
            let text = block.summary.as_deref().unwrap_or(&block.content);
            prompt.push_str(&format!("- {}\n", truncate_chars(text, 200)));
        }
    }
    prompt.push_str("Write one nudge.");
    prompt
}

/// Ask for exactly one candidate. Every failure degrades to `None`.
pub async fn suggest(
    db: &Database,
    completion: &Arc<dyn CompletionAdapter>,
    summary: &ContextSummary,
    snippet_count: usize,
) -> Option<Candidate> {
    match try_suggest(db, completion, summary, snippet_count).await {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(owner = %summary.owner, error = %e, "fallback nudge failed");
            None
        }
    }
}

async fn try_suggest(
    db: &Database,
    completion: &Arc<dyn CompletionAdapter>,
    summary: &ContextSummary,
    snippet_count: usize,
) -> Result<Option<Candidate>, NudgeflowError> {
    let pool = blocks::recent_searchable(db, &summary.owner, "", SNIPPET_POOL).await?;
    let snippets = pick_snippets(pool, snippet_count);
    let request = CompletionRequest::new(FALLBACK_SYSTEM_PROMPT, user_prompt(summary, &snippets))
        .with_max_tokens(200)
        .with_temperature(0.7);
    let response = completion.complete(request).await?;
    let candidate = parse_reply::<FallbackReply>(&response.content, "fallback nudge").and_then(to_candidate);
    debug!(owner = %summary.owner, produced = candidate.is_some(), "fallback nudge reply parsed");
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> Option<Candidate> {
        parse_reply::<FallbackReply>(json, "test").and_then(to_candidate)
    }

    #[test]
    fn reply_fields_are_clamped() {
        let long_title = "t".repeat(60);
        let long_message = "m".repeat(200);
        let c = reply(&format!(
            r#"{{"kind":"reflection","surface":"journal","title":"{long_title}","message":"{long_message}"}}"#
        ))
        .unwrap();
        assert_eq!(c.kind, NudgeKind::Reflection);
        assert_eq!(c.surface, Surface::Journal);
        assert_eq!(c.title.chars().count(), MAX_TITLE_CHARS);
        assert_eq!(c.message.chars().count(), MAX_MESSAGE_CHARS);
        assert_eq!(c.source_rule, FALLBACK_RULE);
        assert_eq!(c.priority, FALLBACK_PRIORITY);
    }

    #[test]
    fn unknown_kind_and_surface_fall_back() {
        let c = reply(r#"{"kind":"dance","surface":"moon","title":"Hi","message":"Try a walk"}"#).unwrap();
        assert_eq!(c.kind, NudgeKind::Suggestion);
        assert_eq!(c.surface, Surface::Home);
    }

    #[test]
    fn malformed_or_blank_replies_yield_nothing() {
        assert!(reply("sure! here's a nudge").is_none());
        assert!(reply(r#"{"title":"","message":"x"}"#).is_none());
        assert!(reply(r#"{"message":"x"}"#).is_none());
    }
}
