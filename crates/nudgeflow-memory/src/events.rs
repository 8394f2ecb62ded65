// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget memory side effects.
//!
//! Retrieval bookkeeping (ledger "retrieve" entries, retrieval counters) and
//! cache invalidation are sent to a background writer task over an unbounded
//! channel. Senders never wait and never observe writer failures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use nudgeflow_core::traits::CacheAdapter;
use nudgeflow_storage::Database;
use nudgeflow_storage::queries::blocks;

use crate::retrieval::owner_pattern;

#[derive(Debug)]
pub enum MemoryEvent {
    /// A block was returned by retrieval.
    Retrieved {
        owner: String,
        block_id: String,
        actor: String,
        similarity: f32,
        at: DateTime<Utc>,
    },
    /// Drop every cached context of the owner.
    InvalidateOwner { owner: String },
    /// Resolves once all earlier events are processed.
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle to the memory event writer.
#[derive(Clone)]
pub struct MemoryEvents {
    tx: mpsc::UnboundedSender<MemoryEvent>,
}

impl MemoryEvents {
    /// Spawn the writer task. It runs until every handle is dropped.
    pub fn spawn(db: Database, cache: Arc<dyn CacheAdapter>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(rx, db, cache));
        (Self { tx }, handle)
    }

    pub fn send(&self, event: MemoryEvent) {
        if self.tx.send(event).is_err() {
            debug!("memory event writer stopped, dropping event");
        }
    }

    pub fn retrieved(&self, owner: &str, block_id: &str, actor: &str, similarity: f32, at: DateTime<Utc>) {
        self.send(MemoryEvent::Retrieved {
            owner: owner.to_string(),
            block_id: block_id.to_string(),
            actor: actor.to_string(),
            similarity,
            at,
        });
    }

    pub fn invalidate_owner(&self, owner: &str) {
        self.send(MemoryEvent::InvalidateOwner {
            owner: owner.to_string(),
        });
    }

    /// Wait until the writer has handled everything sent before this call.
    ///
    /// Returns immediately if the writer is gone.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.send(MemoryEvent::Flush(done));
        let _ = wait.await;
    }
}

async fn run_writer(
    mut rx: mpsc::UnboundedReceiver<MemoryEvent>,
    db: Database,
    cache: Arc<dyn CacheAdapter>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            MemoryEvent::Retrieved {
                owner,
                block_id,
                actor,
                similarity,
                at,
            } => {
                if let Err(e) =
                    blocks::record_retrieval(&db, &owner, &block_id, &actor, similarity, at).await
                {
                    warn!(owner = %owner, block_id = %block_id, error = %e, "failed to record retrieval");
                }
            }
            MemoryEvent::InvalidateOwner { owner } => {
                match cache.invalidate_pattern(&owner_pattern(&owner)).await {
                    Ok(removed) => debug!(owner = %owner, removed, "invalidated cached context"),
                    Err(e) => debug!(owner = %owner, error = %e, "cache invalidation failed"),
                }
            }
            MemoryEvent::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("memory event writer stopped");
}
