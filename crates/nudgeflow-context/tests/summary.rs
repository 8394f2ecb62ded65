// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Duration, TimeZone, Utc};

use nudgeflow_context::{ContextIntegrator, RiskKind, Severity, Trend};
use nudgeflow_core::types::format_ts;
use nudgeflow_storage::queries::{behavior, relations, settings};
use nudgeflow_storage::{RelationType, UserProfile};
use nudgeflow_test_utils::{seed, test_db};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 6, 18, 0, 0).unwrap()
}

#[tokio::test]
async fn empty_user_gets_defaults() {
    let db = test_db().await;
    let summary = ContextIntegrator::new(db).build_summary("new-user", now()).await;

    assert!(summary.themes.is_empty());
    assert_eq!(summary.profile, UserProfile::defaults_for("new-user"));
    assert_eq!(summary.profile.daily_nudge_budget, 2);
    assert_eq!(summary.momentum.streak_days, 0);
    assert_eq!(summary.momentum.completion_rate, 0.0);
    assert!(summary.momentum.last_activity_at.is_none());
    assert_eq!(summary.mood.trend, Trend::Stable);
    assert!(summary.mood.average.is_none());
    assert!(summary.active_goal.is_none());
    // Nobody has journaled, so only the journaling risk fires.
    let kinds: Vec<_> = summary.risks.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RiskKind::NoJournal7d]);
    assert!(!summary.is_rich());
}

#[tokio::test]
async fn low_mood_week_is_flagged_but_not_declining() {
    let db = test_db().await;
    seed::moods(&db, "u1", &[2.0, 2.0, 3.0, 2.0, 2.0], now(), Duration::days(1))
        .await
        .unwrap();
    behavior::insert_journal_entry(&db, "u1", "today was long", now() - Duration::hours(3))
        .await
        .unwrap();

    let summary = ContextIntegrator::new(db).build_summary("u1", now()).await;

    let low = summary
        .risks
        .iter()
        .find(|r| r.kind == RiskKind::LowMood3d)
        .expect("low mood flagged");
    assert_eq!(low.severity, Severity::Medium);
    assert!(!summary.has_risk(RiskKind::NoJournal7d));
    assert_eq!(summary.mood.trend, Trend::Stable);
    assert_eq!(summary.mood.values, vec![2.0, 2.0, 3.0, 2.0, 2.0]);
    assert_eq!(summary.mood.days_since_last, Some(0));
    assert_eq!(summary.momentum.streak_days, 5);
    assert_eq!(summary.momentum.max_streak, 5);
    assert!(summary.is_rich());
}

#[tokio::test]
async fn momentum_and_goals() {
    let db = test_db().await;
    let goal = seed::active_goal(&db, "u1", "Run a 10k", 0.6, now() - Duration::days(20))
        .await
        .unwrap();
    seed::goal_action(&db, "u1", &goal, now() - Duration::days(10), Some(now() - Duration::days(2)))
        .await
        .unwrap();
    seed::goal_action(&db, "u1", &goal, now() - Duration::days(10), Some(now() - Duration::days(9)))
        .await
        .unwrap();
    seed::goal_action(&db, "u1", &goal, now() - Duration::days(10), None)
        .await
        .unwrap();
    behavior::insert_tool_completion(&db, "u1", "box-breathing", now() - Duration::hours(1))
        .await
        .unwrap();

    let summary = ContextIntegrator::new(db).build_summary("u1", now()).await;

    assert_eq!(summary.momentum.active_goal_count, 1);
    assert_eq!(summary.momentum.recent_completions, 1);
    assert!((summary.momentum.completion_rate - 2.0 / 3.0).abs() < 1e-9);
    // Activity today only; two days ago is not adjacent.
    assert_eq!(summary.momentum.streak_days, 1);
    assert_eq!(
        summary.momentum.last_activity_at.as_deref(),
        Some(format_ts(now() - Duration::hours(1)).as_str())
    );
    let active = summary.active_goal.as_ref().expect("active goal");
    assert_eq!(active.title, "Run a 10k");
    assert!(!summary.has_risk(RiskKind::StalledGoal14d));
}

#[tokio::test]
async fn streak_is_zero_until_today_has_activity() {
    let db = test_db().await;
    seed::moods(&db, "u1", &[3.0, 3.0, 3.0], now() - Duration::days(1), Duration::days(1))
        .await
        .unwrap();

    let integrator = ContextIntegrator::new(db.clone());
    let summary = integrator.build_summary("u1", now()).await;
    assert_eq!(summary.momentum.streak_days, 0);
    assert_eq!(summary.momentum.max_streak, 3);

    behavior::insert_tool_completion(&db, "u1", "box-breathing", now() - Duration::hours(1))
        .await
        .unwrap();
    let summary = integrator.build_summary("u1", now()).await;
    assert_eq!(summary.momentum.streak_days, 4);
    assert_eq!(summary.momentum.max_streak, 4);
}

#[tokio::test]
async fn stalled_goal_is_flagged() {
    let db = test_db().await;
    seed::active_goal(&db, "u1", "Learn piano", 0.1, now() - Duration::days(30))
        .await
        .unwrap();
    let summary = ContextIntegrator::new(db).build_summary("u1", now()).await;
    assert!(summary.has_risk(RiskKind::StalledGoal14d));
}

#[tokio::test]
async fn themes_and_connections() {
    let db = test_db().await;
    let recent = now() - Duration::days(1);
    let a = seed::active_block(&db, "u1", "journal", "slept badly", &["sleep", "stress"], recent)
        .await
        .unwrap();
    let b = seed::active_block(&db, "u1", "tools", "breathing helped", &["sleep"], recent)
        .await
        .unwrap();
    seed::active_block(&db, "u1", "journal", "ancient", &["history"], now() - Duration::days(8))
        .await
        .unwrap();
    relations::insert(&db, "u1", &b.id, &a.id, RelationType::Addresses, 0.8, recent)
        .await
        .unwrap();

    let mut profile = UserProfile::defaults_for("u1");
    profile.daily_nudge_budget = 4;
    settings::upsert_profile(&db, profile).await.unwrap();

    let summary = ContextIntegrator::new(db).build_summary("u1", now()).await;
    assert_eq!(summary.themes, vec!["sleep", "stress"]);
    assert_eq!(summary.connections, vec!["tools↔journal:addresses"]);
    assert_eq!(summary.profile.daily_nudge_budget, 4);
}
