// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user memory settings and personalization profiles.

use chrono::{DateTime, Utc};
use nudgeflow_core::NudgeflowError;
use nudgeflow_core::types::format_ts;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{MemorySettings, PrivacyLevel, UserProfile};
use crate::queries::parse_enum;

/// Load memory settings; users without a row get [`MemorySettings::defaults_for`].
pub async fn memory_settings(db: &Database, owner: &str) -> Result<MemorySettings, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            let row: Option<(bool, PrivacyLevel)> = conn
                .query_row(
                    "SELECT memory_enabled, default_privacy FROM memory_settings WHERE owner = ?1",
                    params![owner],
                    |row| Ok((row.get(0)?, parse_enum(1, row.get(1)?)?)),
                )
                .optional()?;
            let disabled_features: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT feature FROM memory_feature_settings
                     WHERE owner = ?1 AND enabled = 0 ORDER BY feature",
                )?;
                stmt.query_map(params![owner], |row| row.get(0))?
                    .collect::<Result<_, _>>()?
            };
            let mut settings = MemorySettings::defaults_for(owner);
            if let Some((memory_enabled, default_privacy)) = row {
                settings.memory_enabled = memory_enabled;
                settings.default_privacy = default_privacy;
            }
            settings.disabled_features = disabled_features;
            Ok(settings)
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert the global memory switch and default privacy level.
pub async fn set_memory_settings(
    db: &Database,
    owner: &str,
    memory_enabled: bool,
    default_privacy: PrivacyLevel,
    now: DateTime<Utc>,
) -> Result<(), NudgeflowError> {
    let owner = owner.to_string();
    let now = format_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO memory_settings (owner, memory_enabled, default_privacy, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (owner) DO UPDATE SET memory_enabled = excluded.memory_enabled,
                 default_privacy = excluded.default_privacy, updated_at = excluded.updated_at",
                params![owner, memory_enabled, default_privacy.as_ref(), now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Switch memory on or off for one source feature.
pub async fn set_feature_enabled(
    db: &Database,
    owner: &str,
    feature: &str,
    enabled: bool,
) -> Result<(), NudgeflowError> {
    let owner = owner.to_string();
    let feature = feature.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO memory_feature_settings (owner, feature, enabled) VALUES (?1, ?2, ?3)
                 ON CONFLICT (owner, feature) DO UPDATE SET enabled = excluded.enabled",
                params![owner, feature, enabled],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load the personalization profile row, if one exists.
pub async fn profile(db: &Database, owner: &str) -> Result<Option<UserProfile>, NudgeflowError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT owner, empathy, formality, brevity, daily_nudge_budget, energy_bias,
                 cadence_bias, quiet_start_hour, quiet_end_hour, utc_offset_minutes
                 FROM user_profiles WHERE owner = ?1",
                params![owner],
                |row| {
                    Ok(UserProfile {
                        owner: row.get(0)?,
                        empathy: row.get(1)?,
                        formality: row.get(2)?,
                        brevity: row.get(3)?,
                        daily_nudge_budget: row.get(4)?,
                        energy_bias: row.get(5)?,
                        cadence_bias: row.get(6)?,
                        quiet_start_hour: row.get(7)?,
                        quiet_end_hour: row.get(8)?,
                        utc_offset_minutes: row.get(9)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a personalization profile.
pub async fn upsert_profile(db: &Database, profile: UserProfile) -> Result<(), NudgeflowError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO user_profiles (owner, empathy, formality, brevity,
                 daily_nudge_budget, energy_bias, cadence_bias, quiet_start_hour, quiet_end_hour,
                 utc_offset_minutes) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    profile.owner,
                    profile.empathy,
                    profile.formality,
                    profile.brevity,
                    profile.daily_nudge_budget,
                    profile.energy_bias,
                    profile.cadence_bias,
                    profile.quiet_start_hour,
                    profile.quiet_end_hour,
                    profile.utc_offset_minutes,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
