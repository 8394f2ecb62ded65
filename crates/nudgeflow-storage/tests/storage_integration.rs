// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-module storage tests: concurrent claims and the nudge lifecycle.

use chrono::{DateTime, Duration, TimeZone, Utc};
use nudgeflow_core::types::format_ts;
use nudgeflow_storage::queries::nudges::{self, Interaction};
use nudgeflow_storage::queries::jobs;
use nudgeflow_storage::{
    Database, JobStatus, JobType, NewJob, Nudge, NudgeKind, Payload, PayloadValue, Surface,
};
use serde_json::json;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn nudge(owner: &str, id: &str, surface: Surface, priority: u8, expires: DateTime<Utc>) -> Nudge {
    Nudge {
        id: id.into(),
        owner: owner.into(),
        kind: NudgeKind::JournalPrompt,
        surface,
        title: "Capture the moment".into(),
        message: "Write a few lines about how that felt.".into(),
        cta_label: Some("Open journal".into()),
        cta_payload: Payload::from([("route".to_string(), "journal/new".into())]),
        priority,
        source_rule: "bridge.tool_to_journal".into(),
        explanation: "You finished a tool recently.".into(),
        context_snapshot: Payload::new(),
        created_at: format_ts(t0()),
        shown_at: None,
        accepted_at: None,
        dismissed_at: None,
        completed_at: None,
        expires_at: format_ts(expires),
    }
}

#[tokio::test]
async fn concurrent_claimers_each_job_claimed_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("claims.db");
    let db = Database::open(path.to_str().unwrap(), true).await.unwrap();

    let job_id = jobs::enqueue(
        &db,
        NewJob::new(JobType::EnrichAndEmbed, "u1", json!({"block_id": "b1"})),
        t0(),
    )
    .await
    .unwrap();

    // Separate connections to the same file act like separate worker processes.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
        handles.push(tokio::spawn(async move {
            jobs::claim_next(&db, 1, t0()).await.unwrap().len()
        }));
    }
    let mut winners = 0;
    for handle in handles {
        winners += handle.await.unwrap();
    }
    assert_eq!(winners, 1);
    assert_eq!(
        jobs::get(&db, &job_id).await.unwrap().unwrap().status,
        JobStatus::Processing
    );
}

#[tokio::test]
async fn nudge_lifecycle_and_sweep() {
    let db = Database::open_in_memory().await.unwrap();
    let expires = t0() + Duration::hours(24);
    nudges::insert_many(
        &db,
        vec![
            nudge("u1", "n1", Surface::Home, 6, expires),
            nudge("u1", "n2", Surface::Journal, 8, expires),
            nudge("u1", "n3", Surface::Home, 3, t0() + Duration::hours(1)),
        ],
    )
    .await
    .unwrap();

    let home: Vec<_> = nudges::active(&db, "u1", Some(Surface::Home), t0())
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(home, vec!["n1", "n3"]);
    let all = nudges::active(&db, "u1", None, t0()).await.unwrap();
    assert_eq!(all[0].id, "n2");
    assert_eq!(all[0].cta_payload["route"], PayloadValue::from("journal/new"));

    assert!(nudges::record_interaction(&db, "u1", "n1", Interaction::Shown, t0()).await.unwrap());
    assert!(!nudges::record_interaction(&db, "u1", "n1", Interaction::Shown, t0()).await.unwrap());
    assert!(!nudges::record_interaction(&db, "u2", "n2", Interaction::Shown, t0()).await.unwrap());
    assert!(nudges::record_interaction(&db, "u1", "n2", Interaction::Dismissed, t0()).await.unwrap());

    let shown = nudges::shown_between(&db, "u1", t0() - Duration::hours(9), t0() + Duration::hours(15))
        .await
        .unwrap();
    assert_eq!(shown, 1);

    let remaining: Vec<_> = nudges::active(&db, "u1", None, t0())
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(remaining, vec!["n1", "n3"]);

    assert_eq!(nudges::sweep_expired(&db, t0() + Duration::hours(2)).await.unwrap(), 1);
    // n1 was shown at t0, so it outlives its expiry until the shown window passes.
    assert_eq!(nudges::sweep_expired(&db, expires).await.unwrap(), 1);
    assert_eq!(nudges::sweep_expired(&db, t0() + Duration::hours(47)).await.unwrap(), 0);
    assert_eq!(nudges::sweep_expired(&db, t0() + Duration::hours(49)).await.unwrap(), 1);
}
