// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema migrations for the nudgeflow store.
//!
//! The SQL under `migrations/` is embedded at compile time; [`Database::open`]
//! applies whatever has not run yet.
//!
//! [`Database::open`]: crate::Database::open

use nudgeflow_core::NudgeflowError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply pending migrations. Applied versions are recorded in
/// `refinery_schema_history`.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), NudgeflowError> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| NudgeflowError::Storage {
            source: Box::new(e),
        })?;
    Ok(())
}
