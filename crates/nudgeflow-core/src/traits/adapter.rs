// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all collaborator adapters implement.

use async_trait::async_trait;

use crate::error::NudgeflowError;
use crate::types::{AdapterType, HealthStatus};

/// Identity and health capabilities shared by every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Stable name used in logs and health output.
    fn name(&self) -> &str;

    /// Returns the kind of collaborator this adapter fronts.
    fn adapter_type(&self) -> AdapterType;

    /// Adapters without a cheap probe report healthy.
    async fn health_check(&self) -> Result<HealthStatus, NudgeflowError> {
        Ok(HealthStatus::Healthy)
    }
}
