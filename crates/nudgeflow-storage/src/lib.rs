// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for nudgeflow.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for the job
//! queue, memory blocks, relations, the memory ledger, user settings,
//! behavioral tables, nudges, and rate-limit counters.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, map_tr_err};
pub use models::*;
