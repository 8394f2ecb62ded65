// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dedup, quiet hours, and the daily budget.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

use nudgeflow_storage::{NudgeKind, UserProfile};

use crate::candidate::Candidate;

fn offset(profile: &UserProfile) -> Duration {
    Duration::minutes(i64::from(profile.utc_offset_minutes))
}

/// Whether `now` falls in the owner's local `[quiet_start, quiet_end)` hours.
///
/// The window wraps midnight when start > end. Equal hours disable it.
pub fn in_quiet_hours(profile: &UserProfile, now: DateTime<Utc>) -> bool {
    let (start, end) = (u32::from(profile.quiet_start_hour), u32::from(profile.quiet_end_hour));
    if start == end {
        return false;
    }
    let hour = (now + offset(profile)).hour();
    if start < end {
        (start..end).contains(&hour)
    } else {
        hour >= start || hour < end
    }
}

/// UTC bounds `[start, end)` of the owner's local calendar day containing `now`.
pub fn local_day_bounds(profile: &UserProfile, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = (now + offset(profile)).date_naive().and_time(NaiveTime::MIN);
    let start = local_midnight.and_utc() - offset(profile);
    (start, start + Duration::days(1))
}

/// Keep the highest-priority candidate of each kind.
///
/// Ties keep the earlier candidate. Survivors stay in their original order.
pub fn dedup_by_kind(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut best: HashMap<NudgeKind, usize> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        match best.get(&c.kind) {
            Some(&j) if candidates[j].priority >= c.priority => {}
            _ => {
                best.insert(c.kind, i);
            }
        }
    }
    candidates
        .into_iter()
        .enumerate()
        .filter(|(i, c)| best.get(&c.kind) == Some(i))
        .map(|(_, c)| c)
        .collect()
}

/// Nudges still allowed today.
pub fn remaining_budget(daily_budget: u32, shown_today: u32) -> usize {
    daily_budget.saturating_sub(shown_today) as usize
}

/// Sort by priority, highest first (stable), then keep at most `remaining`.
pub fn rank_and_cap(mut candidates: Vec<Candidate>, remaining: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates.truncate(remaining);
    candidates
}
