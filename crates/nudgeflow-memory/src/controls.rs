// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit user memory controls and the explainability view.
//!
//! Every control is owner-checked, ledgered with its actor and reason, and
//! drops the owner's cached context.

use chrono::{DateTime, Utc};
use tracing::info;

use nudgeflow_core::NudgeflowError;
use nudgeflow_storage::queries::blocks::{self, ControlAction};
use nudgeflow_storage::queries::ledger;
use nudgeflow_storage::{LedgerEntry, PrivacyLevel};

use crate::MemoryPipeline;

impl MemoryPipeline {
    /// Exclude a block from retrieval and relation detection for good.
    pub async fn exclude_block(
        &self,
        action: ControlAction,
        now: DateTime<Utc>,
    ) -> Result<(), NudgeflowError> {
        let owner = action.owner.clone();
        let block_id = action.block_id.clone();
        blocks::exclude(&self.db, action, now).await?;
        self.events.invalidate_owner(&owner);
        info!(owner = %owner, block_id = %block_id, "memory block excluded");
        Ok(())
    }

    /// Delete a block and its relations. The ledger keeps its history.
    pub async fn delete_block(&self, action: ControlAction, now: DateTime<Utc>) -> Result<(), NudgeflowError> {
        let owner = action.owner.clone();
        let block_id = action.block_id.clone();
        blocks::delete(&self.db, action, now).await?;
        self.events.invalidate_owner(&owner);
        info!(owner = %owner, block_id = %block_id, "memory block deleted");
        Ok(())
    }

    pub async fn set_privacy(
        &self,
        action: ControlAction,
        level: PrivacyLevel,
        now: DateTime<Utc>,
    ) -> Result<(), NudgeflowError> {
        let owner = action.owner.clone();
        let block_id = action.block_id.clone();
        blocks::set_privacy(&self.db, action, level, now).await?;
        self.events.invalidate_owner(&owner);
        info!(owner = %owner, block_id = %block_id, privacy = %level, "memory block privacy changed");
        Ok(())
    }

    /// Why a block was remembered and when it was retrieved, oldest first.
    pub async fn ledger_for_block(
        &self,
        owner: &str,
        block_id: &str,
    ) -> Result<Vec<LedgerEntry>, NudgeflowError> {
        ledger::for_block(&self.db, owner, block_id).await
    }
}
