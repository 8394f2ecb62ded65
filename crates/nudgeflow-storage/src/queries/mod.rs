// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for operations on storage entities.

pub mod behavior;
pub mod blocks;
pub mod jobs;
pub mod ledger;
pub mod nudges;
pub mod rate_limits;
pub mod relations;
pub mod settings;
pub mod snapshots;

/// Reads a snake_case enum column, surfacing unknown values as a conversion error.
pub(crate) fn parse_enum<T: std::str::FromStr>(
    idx: usize,
    raw: String,
) -> Result<T, rusqlite::Error> {
    raw.parse::<T>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown enum value `{raw}`").into(),
        )
    })
}

/// Reads a JSON column into a typed value.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: String,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Encodes a value for a JSON column.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}
