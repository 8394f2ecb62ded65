// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge engine tests against an in-memory store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use nudgeflow_config::{FeatureConfig, NudgeConfig};
use nudgeflow_context::{ContextSummary, Momentum, MoodSummary, RiskFlag, RiskKind, Severity};
use nudgeflow_core::types::format_ts;
use nudgeflow_nudge::{Candidate, NudgeEngine, RuleInput, RulePack};
use nudgeflow_storage::queries::behavior;
use nudgeflow_storage::{Database, NudgeKind, PayloadValue, Surface, UserProfile};
use nudgeflow_test_utils::{MockCompletion, seed, test_db};

const FALLBACK_REPLY: &str = r#"```json
{"kind": "reflection", "surface": "journal", "title": "Sleep and study",
 "message": "You've written about both lately. Jot down one thing that helped you rest.",
 "cta_label": "Write"}
```"#;

/// Monday 2026-03-02 15:00 UTC.
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
}

fn summary(owner: &str) -> ContextSummary {
    ContextSummary {
        owner: owner.into(),
        generated_at: format_ts(now()),
        themes: Vec::new(),
        risks: Vec::new(),
        momentum: Momentum {
            last_activity_at: Some(format_ts(now())),
            ..Momentum::default()
        },
        active_goal: None,
        mood: MoodSummary::default(),
        profile: UserProfile::defaults_for(owner),
        connections: Vec::new(),
    }
}

/// Matches the risk, momentum, and bridge packs once a tool was just used.
fn busy_summary(owner: &str) -> ContextSummary {
    let mut s = summary(owner);
    s.momentum.streak_days = 6;
    s.risks.push(RiskFlag {
        kind: RiskKind::LowMood3d,
        severity: Severity::Medium,
        description: "Average mood 2.3 over the last 3 check-ins".into(),
    });
    s
}

fn rich_summary(owner: &str) -> ContextSummary {
    let mut s = summary(owner);
    s.themes = vec!["sleep".into(), "study".into()];
    s
}

fn engine(db: &Database, completion: Arc<MockCompletion>, llm: bool) -> NudgeEngine {
    let features = FeatureConfig {
        llm_nudges_enabled: llm,
        ..FeatureConfig::default()
    };
    NudgeEngine::new(db.clone(), completion, features, NudgeConfig::default())
}

fn rules(nudges: &[nudgeflow_storage::Nudge]) -> Vec<&str> {
    nudges.iter().map(|n| n.source_rule.as_str()).collect()
}

#[tokio::test]
async fn budget_keeps_the_highest_priorities() {
    let db = test_db().await;
    behavior::insert_tool_completion(&db, "u1", "box breathing", now() - Duration::minutes(20))
        .await
        .unwrap();
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);

    let nudges = engine.generate("u1", &busy_summary("u1"), None, now()).await.unwrap();

    // Three packs match; the budget of 2 keeps the two most important.
    assert_eq!(rules(&nudges), vec!["risk.low_mood_3d", "bridge.tool_to_journal"]);
    assert_eq!(nudges[0].priority, 8);
    let stored = engine.active_nudges("u1", None, now()).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].expires_at, format_ts(now() + Duration::hours(24)));
    assert_eq!(
        stored[0].context_snapshot.get("streak_days"),
        Some(&PayloadValue::Number(6.0))
    );
}

#[tokio::test]
async fn spent_budget_returns_nothing() {
    let db = test_db().await;
    behavior::insert_tool_completion(&db, "u1", "box breathing", now() - Duration::minutes(20))
        .await
        .unwrap();
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);

    let first = engine.generate("u1", &busy_summary("u1"), None, now()).await.unwrap();
    for n in &first {
        assert!(engine.mark_shown("u1", &n.id, now() - Duration::hours(1)).await.unwrap());
    }

    let second = engine.generate("u1", &busy_summary("u1"), None, now()).await.unwrap();
    assert!(second.is_empty());

    // Shown yesterday does not count against today.
    let tomorrow = now() + Duration::days(1);
    let third = engine.generate("u1", &busy_summary("u1"), None, tomorrow).await.unwrap();
    assert!(!third.is_empty());
}

#[tokio::test]
async fn quiet_hours_return_nothing() {
    let db = test_db().await;
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);
    let late = Utc.with_ymd_and_hms(2026, 3, 2, 23, 15, 0).unwrap();

    let nudges = engine.generate("u1", &busy_summary("u1"), None, late).await.unwrap();
    assert!(nudges.is_empty());
    assert!(engine.active_nudges("u1", None, late).await.unwrap().is_empty());

    // Quiet hours are local: 23:15 UTC is 18:15 at UTC-5.
    let mut eastern = busy_summary("u1");
    eastern.profile.utc_offset_minutes = -300;
    let nudges = engine.generate("u1", &eastern, None, late).await.unwrap();
    assert!(!nudges.is_empty());
}

struct SameKind;

impl RulePack for SameKind {
    fn name(&self) -> &'static str {
        "same"
    }

    fn evaluate(&self, _input: &RuleInput<'_>) -> Vec<Candidate> {
        vec![
            Candidate::new("same.low", NudgeKind::JournalPrompt, Surface::Journal, 3, "a", "b"),
            Candidate::new("same.high", NudgeKind::JournalPrompt, Surface::Journal, 7, "c", "d"),
        ]
    }
}

#[tokio::test]
async fn same_kind_keeps_highest_priority() {
    let db = test_db().await;
    let engine = engine(&db, Arc::new(MockCompletion::new()), false).with_packs(vec![Box::new(SameKind)]);

    let nudges = engine.generate("u1", &summary("u1"), None, now()).await.unwrap();
    assert_eq!(rules(&nudges), vec!["same.high"]);
    assert_eq!(nudges[0].priority, 7);
}

#[tokio::test]
async fn surface_filter_applies_before_budget() {
    let db = test_db().await;
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);
    let mut s = busy_summary("u1");
    s.active_goal = Some(nudgeflow_context::ActiveGoal {
        id: "g1".into(),
        title: "Run a 5k".into(),
        progress: 0.6,
        created_at: format_ts(now() - Duration::days(20)),
        last_activity_at: Some(format_ts(now())),
    });

    let nudges = engine.generate("u1", &s, Some(Surface::Goals), now()).await.unwrap();
    assert_eq!(rules(&nudges), vec!["momentum.goal_progress"]);
    assert!(nudges.iter().all(|n| n.surface == Surface::Goals));
}

#[tokio::test]
async fn fallback_runs_when_no_rule_matches() {
    let db = test_db().await;
    seed::active_block(&db, "u1", "journal", "Slept badly before the exam", &["sleep"], now())
        .await
        .unwrap();
    let completion = Arc::new(MockCompletion::with_responses([FALLBACK_REPLY]));
    let engine = engine(&db, completion.clone(), true);

    let nudges = engine.generate("u1", &rich_summary("u1"), None, now()).await.unwrap();

    assert_eq!(completion.call_count(), 1);
    assert_eq!(rules(&nudges), vec!["llm-fallback"]);
    assert_eq!(nudges[0].priority, 4);
    assert_eq!(nudges[0].kind, NudgeKind::Reflection);
    assert_eq!(nudges[0].surface, Surface::Journal);
    assert_eq!(nudges[0].cta_label.as_deref(), Some("Write"));
    let requests = completion.requests().await;
    assert!(requests[0].user_prompt.contains("Slept badly before the exam"));
    assert!(requests[0].user_prompt.contains("sleep, study"));
}

#[tokio::test]
async fn fallback_is_gated() {
    let db = test_db().await;

    // Switched off.
    let completion = Arc::new(MockCompletion::with_responses([FALLBACK_REPLY]));
    let nudges = engine(&db, completion.clone(), false)
        .generate("u1", &rich_summary("u1"), None, now())
        .await
        .unwrap();
    assert!(nudges.is_empty());
    assert_eq!(completion.call_count(), 0);

    // Not enough context.
    let completion = Arc::new(MockCompletion::with_responses([FALLBACK_REPLY]));
    let nudges = engine(&db, completion.clone(), true)
        .generate("u1", &summary("u1"), None, now())
        .await
        .unwrap();
    assert!(nudges.is_empty());
    assert_eq!(completion.call_count(), 0);

    // No budget.
    let mut no_budget = rich_summary("u1");
    no_budget.profile.daily_nudge_budget = 0;
    let nudges = engine(&db, completion.clone(), true)
        .generate("u1", &no_budget, None, now())
        .await
        .unwrap();
    assert!(nudges.is_empty());
    assert_eq!(completion.call_count(), 0);

    // A rule already matched.
    let mut matched = rich_summary("u1");
    matched.momentum.streak_days = 5;
    let nudges = engine(&db, completion.clone(), true)
        .generate("u1", &matched, None, now())
        .await
        .unwrap();
    assert_eq!(rules(&nudges), vec!["momentum.streak"]);
    assert_eq!(completion.call_count(), 0);
}

#[tokio::test]
async fn fallback_failures_yield_nothing() {
    let db = test_db().await;
    let completion = Arc::new(MockCompletion::with_responses(["I think a walk would be nice!"]));
    let engine_ok = engine(&db, completion.clone(), true);
    let nudges = engine_ok.generate("u1", &rich_summary("u1"), None, now()).await.unwrap();
    assert!(nudges.is_empty());
    assert_eq!(completion.call_count(), 1);

    completion.push_failure("upstream 503").await;
    let nudges = engine_ok.generate("u1", &rich_summary("u1"), None, now()).await.unwrap();
    assert!(nudges.is_empty());
}

#[tokio::test]
async fn sweeping_expired_nudges_keeps_todays_budget_spent() {
    let db = test_db().await;
    let yesterday = now() - Duration::hours(23);
    behavior::insert_tool_completion(&db, "u1", "box breathing", yesterday - Duration::minutes(20))
        .await
        .unwrap();
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);

    let first = engine.generate("u1", &busy_summary("u1"), None, yesterday).await.unwrap();
    assert_eq!(first.len(), 2);
    let morning = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
    for n in &first {
        assert!(engine.mark_shown("u1", &n.id, morning).await.unwrap());
    }

    // Both expired at 16:00 but were shown today.
    let later = Utc.with_ymd_and_hms(2026, 3, 2, 16, 30, 0).unwrap();
    assert_eq!(engine.sweep_expired(later).await.unwrap(), 0);
    let again = engine.generate("u1", &busy_summary("u1"), None, later).await.unwrap();
    assert!(again.is_empty());

    // Once the shown window has passed they go.
    assert_eq!(engine.sweep_expired(morning + Duration::hours(49)).await.unwrap(), 2);
}

#[tokio::test]
async fn lifecycle_transitions() {
    let db = test_db().await;
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);
    let mut s = summary("u1");
    s.momentum.streak_days = 5;
    s.risks.push(RiskFlag {
        kind: RiskKind::NoJournal7d,
        severity: Severity::Low,
        description: "No journal entry in 7 days".into(),
    });
    let nudges = engine.generate("u1", &s, None, now()).await.unwrap();
    assert_eq!(nudges.len(), 2);
    let (a, b) = (&nudges[0], &nudges[1]);

    assert!(engine.accept("u1", &a.id, now()).await.unwrap());
    assert!(!engine.accept("u1", &a.id, now()).await.unwrap());
    assert!(!engine.dismiss("someone-else", &b.id, now()).await.unwrap());

    let active = engine.active_nudges("u1", None, now()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);

    assert!(engine.complete("u1", &b.id, now()).await.unwrap());
    assert!(engine.active_nudges("u1", None, now()).await.unwrap().is_empty());

    assert_eq!(engine.sweep_expired(now() + Duration::hours(1)).await.unwrap(), 0);
    assert_eq!(engine.sweep_expired(now() + Duration::hours(24)).await.unwrap(), 2);
}

#[tokio::test]
async fn user_action_builds_context_from_the_store() {
    let db = test_db().await;
    let friday = Utc.with_ymd_and_hms(2026, 3, 6, 18, 0, 0).unwrap();
    seed::moods(&db, "u1", &[2.0, 2.0, 3.0, 2.0, 2.0], friday, Duration::days(1))
        .await
        .unwrap();
    behavior::insert_journal_entry(&db, "u1", "today was long", friday - Duration::hours(3))
        .await
        .unwrap();
    let engine = engine(&db, Arc::new(MockCompletion::new()), false);

    let nudges = engine.on_user_action("u1", None, friday).await.unwrap();

    assert_eq!(rules(&nudges), vec!["risk.low_mood_3d", "wellness.sustained_low_mood"]);
    assert!(nudges.iter().all(|n| !n.explanation.is_empty()));
}
