// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in observability sinks.

use async_trait::async_trait;
use tracing::info;

use crate::error::NudgeflowError;
use crate::traits::{ObservabilitySink, PluginAdapter};
use crate::types::{AdapterType, TraceEvent};

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl PluginAdapter for NoopSink {
    fn name(&self) -> &str {
        "noop"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }
}

#[async_trait]
impl ObservabilitySink for NoopSink {
    async fn record(&self, _event: TraceEvent) -> Result<(), NudgeflowError> {
        Ok(())
    }
}

/// Writes every event to the `nudgeflow::trace` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl PluginAdapter for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }
}

#[async_trait]
impl ObservabilitySink for TracingSink {
    async fn record(&self, event: TraceEvent) -> Result<(), NudgeflowError> {
        let attributes = serde_json::to_string(&event.attributes)?;
        info!(
            target: "nudgeflow::trace",
            event = %event.name,
            owner = event.owner.as_deref().unwrap_or("-"),
            attributes = %attributes,
            "trace"
        );
        Ok(())
    }
}
