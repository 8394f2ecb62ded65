// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`Database`] handle is the single writer. Query modules accept
//! `&Database` and go through [`Database::connection`]. Cross-process
//! coordination (several worker processes on one file) relies on conditional
//! updates, never on in-process locks.

use nudgeflow_core::NudgeflowError;
use tracing::{debug, info};

use crate::migrations;

/// Convert a tokio-rusqlite error into `NudgeflowError::Storage`.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> NudgeflowError {
    NudgeflowError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the SQLite store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and run migrations.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, NudgeflowError> {
        let parent = std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty());
        if let Some(parent) = parent {
            std::fs::create_dir_all(parent).map_err(|e| NudgeflowError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| NudgeflowError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(wal_mode).await?;
        info!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, NudgeflowError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| NudgeflowError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.initialize(false).await?;
        Ok(db)
    }

    async fn initialize(&self, wal_mode: bool) -> Result<(), NudgeflowError> {
        self.conn
            .call(move |conn| {
                if wal_mode {
                    let mode: String = conn.pragma_update_and_check(
                        None,
                        "journal_mode",
                        "WAL",
                        |row| row.get(0),
                    )?;
                    debug!(mode = %mode, "journal mode set");
                }
                conn.pragma_update(None, "foreign_keys", true)?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| NudgeflowError::Storage {
                source: Box::new(e),
            })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Close the connection, flushing the WAL.
    pub async fn close(self) -> Result<(), NudgeflowError> {
        self.conn.close().await.map_err(|e| NudgeflowError::Storage {
            source: Box::new(e),
        })
    }
}
