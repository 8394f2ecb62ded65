// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The nudge engine: rules, fallback, surface filter, dedup, cadence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use nudgeflow_config::{FeatureConfig, NudgeConfig};
use nudgeflow_context::{ContextIntegrator, ContextSummary};
use nudgeflow_core::types::format_ts;
use nudgeflow_core::{CompletionAdapter, NudgeflowError};
use nudgeflow_storage::queries::nudges::{self, Interaction};
use nudgeflow_storage::{Database, Nudge, Payload, PayloadValue, Surface};

use crate::cadence::{dedup_by_kind, in_quiet_hours, local_day_bounds, rank_and_cap, remaining_budget};
use crate::candidate::Candidate;
use crate::fallback;
use crate::rules::{RuleInput, RulePack, default_packs};
use crate::signals;

/// Decides what to nudge, and records what the user did with it.
#[derive(Clone)]
pub struct NudgeEngine {
    db: Database,
    completion: Arc<dyn CompletionAdapter>,
    features: FeatureConfig,
    config: NudgeConfig,
    packs: Arc<Vec<Box<dyn RulePack>>>,
}

impl NudgeEngine {
    pub fn new(
        db: Database,
        completion: Arc<dyn CompletionAdapter>,
        features: FeatureConfig,
        config: NudgeConfig,
    ) -> Self {
        let packs = Arc::new(default_packs(&config));
        Self {
            db,
            completion,
            features,
            config,
            packs,
        }
    }

    /// Replace the rule packs, keeping their order.
    pub fn with_packs(mut self, packs: Vec<Box<dyn RulePack>>) -> Self {
        self.packs = Arc::new(packs);
        self
    }

    /// Produce, persist, and return the nudges to show `owner` now.
    ///
    /// Quiet hours and an exhausted daily budget return an empty list.
    pub async fn generate(
        &self,
        owner: &str,
        summary: &ContextSummary,
        target_surface: Option<Surface>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Nudge>, NudgeflowError> {
        let signals = signals::gather(&self.db, owner, &self.config, now).await;
        let input = RuleInput {
            summary,
            signals: &signals,
            now,
        };
        let mut candidates: Vec<Candidate> = self.packs.iter().flat_map(|p| p.evaluate(&input)).collect();
        debug!(owner, matched = candidates.len(), "rule packs evaluated");

        if candidates.is_empty() && fallback::gate_open(summary, self.features.llm_nudges_enabled) {
            if let Some(candidate) =
                fallback::suggest(&self.db, &self.completion, summary, self.config.fallback_snippets).await
            {
                metrics::counter!("nudgeflow_fallback_nudges_total").increment(1);
                candidates.push(candidate);
            }
        }

        if let Some(surface) = target_surface {
            candidates.retain(|c| c.surface == surface);
        }
        let candidates = dedup_by_kind(candidates);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let profile = &summary.profile;
        if in_quiet_hours(profile, now) {
            debug!(owner, "quiet hours, no nudges");
            return Ok(Vec::new());
        }
        let (day_start, day_end) = local_day_bounds(profile, now);
        let shown = nudges::shown_between(&self.db, owner, day_start, day_end).await?;
        let remaining = remaining_budget(profile.daily_nudge_budget, shown);
        if remaining == 0 {
            debug!(owner, shown, budget = profile.daily_nudge_budget, "daily nudge budget spent");
            return Ok(Vec::new());
        }

        let selected = rank_and_cap(candidates, remaining);
        let stored = self.store_nudges(owner, selected, summary, now).await?;
        info!(
            owner,
            count = stored.len(),
            rules = ?stored.iter().map(|n| n.source_rule.as_str()).collect::<Vec<_>>(),
            "nudges generated"
        );
        Ok(stored)
    }

    /// Build the owner's context summary and generate nudges from it.
    pub async fn on_user_action(
        &self,
        owner: &str,
        target_surface: Option<Surface>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Nudge>, NudgeflowError> {
        let summary = ContextIntegrator::new(self.db.clone()).build_summary(owner, now).await;
        self.generate(owner, &summary, target_surface, now).await
    }

    /// Persist candidates as nudges expiring after the configured TTL.
    pub async fn store_nudges(
        &self,
        owner: &str,
        candidates: Vec<Candidate>,
        summary: &ContextSummary,
        now: DateTime<Utc>,
    ) -> Result<Vec<Nudge>, NudgeflowError> {
        let snapshot = context_snapshot(summary);
        let created_at = format_ts(now);
        let expires_at = format_ts(now + Duration::hours(self.config.ttl_hours));
        let records: Vec<Nudge> = candidates
            .into_iter()
            .map(|c| Nudge {
                id: uuid::Uuid::new_v4().to_string(),
                owner: owner.to_string(),
                kind: c.kind,
                surface: c.surface,
                title: c.title,
                message: c.message,
                cta_label: c.cta_label,
                cta_payload: c.cta_payload,
                priority: c.priority,
                source_rule: c.source_rule,
                explanation: c.explanation,
                context_snapshot: snapshot.clone(),
                created_at: created_at.clone(),
                shown_at: None,
                accepted_at: None,
                dismissed_at: None,
                completed_at: None,
                expires_at: expires_at.clone(),
            })
            .collect();
        nudges::insert_many(&self.db, records.clone()).await?;
        metrics::counter!("nudgeflow_nudges_generated_total").increment(records.len() as u64);
        Ok(records)
    }

    pub async fn active_nudges(
        &self,
        owner: &str,
        surface: Option<Surface>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Nudge>, NudgeflowError> {
        nudges::active(&self.db, owner, surface, now).await
    }

    /// Stamp `shown_at`. Shown nudges count against today's budget.
    pub async fn mark_shown(&self, owner: &str, nudge_id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
        self.interact(owner, nudge_id, Interaction::Shown, now).await
    }

    pub async fn accept(&self, owner: &str, nudge_id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
        self.interact(owner, nudge_id, Interaction::Accepted, now).await
    }

    pub async fn dismiss(&self, owner: &str, nudge_id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
        self.interact(owner, nudge_id, Interaction::Dismissed, now).await
    }

    pub async fn complete(&self, owner: &str, nudge_id: &str, now: DateTime<Utc>) -> Result<bool, NudgeflowError> {
        self.interact(owner, nudge_id, Interaction::Completed, now).await
    }

    /// Delete expired nudges. Returns how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, NudgeflowError> {
        let removed = nudges::sweep_expired(&self.db, now).await?;
        if removed > 0 {
            info!(removed, "expired nudges swept");
        }
        Ok(removed)
    }

    async fn interact(
        &self,
        owner: &str,
        nudge_id: &str,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> Result<bool, NudgeflowError> {
        let changed = nudges::record_interaction(&self.db, owner, nudge_id, interaction, now).await?;
        debug!(owner, nudge_id, ?interaction, changed, "nudge interaction");
        Ok(changed)
    }
}

/// The slice of context a nudge was generated from, kept for explainability.
pub fn context_snapshot(summary: &ContextSummary) -> Payload {
    let mut snapshot = Payload::new();
    snapshot.insert("themes".into(), PayloadValue::from(summary.themes.clone()));
    snapshot.insert(
        "risks".into(),
        PayloadValue::from(summary.risks.iter().map(|r| r.kind.to_string()).collect::<Vec<_>>()),
    );
    snapshot.insert("streak_days".into(), summary.momentum.streak_days.into());
    snapshot.insert("mood_trend".into(), summary.mood.trend.to_string().into());
    if let Some(avg) = summary.mood.average {
        snapshot.insert("mood_average".into(), avg.into());
    }
    if let Some(goal) = &summary.active_goal {
        snapshot.insert("active_goal".into(), goal.title.clone().into());
    }
    snapshot
}
